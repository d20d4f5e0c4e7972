use std::path::PathBuf;

use derive_more::From;
use thiserror::Error;

use crate::firmware::FirmwareError;
use crate::handlers::{FocusByteError, FrameCodecError};
use crate::hw::{CatalogError, TransportError};

/// Errors returned by driver commands.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    FrameCodec(#[from] FrameCodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors returned when validating command-line input.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("hex input has an odd number of digits")]
    InvalidHexLength,
    #[error("hex input contains invalid byte `{value}`")]
    InvalidHexByte { value: String },
    #[error("no hex input was given")]
    EmptyInput,
    #[error("failed to read `{path}`")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write `{path}`")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid focus grid entry `{value}`; expected COLUMN:ROW=VALUE")]
    InvalidFocusEntry { value: String },
    #[error("pass either --key or --lens-xml")]
    MissingKey,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Errors from operations that cross module boundaries, such as keying a decryptor
/// from lens metadata or writing an adjusted focus value.
#[derive(Debug, Error, From)]
pub enum ProtocolError {
    #[error(transparent)]
    #[from(FocusByteError, Box<FocusByteError>)]
    FocusByte(Box<FocusByteError>),
    #[error(transparent)]
    #[from(CatalogError, Box<CatalogError>)]
    Catalog(Box<CatalogError>),
    #[error(transparent)]
    #[from(FirmwareError, Box<FirmwareError>)]
    Firmware(Box<FirmwareError>),
    #[error(transparent)]
    #[from(DriverError, Box<DriverError>)]
    Driver(Box<DriverError>),
}
