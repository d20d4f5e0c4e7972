use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::cli::decode::DecodeArgs;
use crate::cli::decrypt::DecryptArgs;
use crate::cli::encode::EncodeArgs;
use crate::error::CliConfigError;
use crate::utils::parse_hex_bytes;

/// Command-line options for the TAP-in console tool.
#[derive(Debug, Parser)]
#[command(name = "tapin", about = "Decode, build and decrypt TAP-in console traffic.")]
pub struct Args {
    /// Log level; overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use tapin::{Args, Command, DecodeArgs};
    ///
    /// let args = Args::new(Command::Decode(DecodeArgs::new(vec!["0F03".to_string()])));
    /// assert_eq!(None, args.log_level());
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            format: None,
            command,
        }
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.format
    }

    #[must_use]
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode captured console traffic, one hex chunk per argument.
    Decode(DecodeArgs),
    /// Print the frame the driver would write for one command.
    Encode(EncodeArgs),
    /// Decrypt a lens firmware image.
    Decrypt(DecryptArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Decode(_args) => "decode",
            Self::Encode(_args) => "encode",
            Self::Decrypt(_args) => "decrypt",
        }
    }
}

/// Log level accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Rendering used for command output.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Coloured tables for humans.
    Pretty,
    /// JSON documents for scripts.
    Json,
}

/// Parses one hex argument into bytes.
pub(crate) fn hex_argument(value: &str) -> Result<Vec<u8>, CliConfigError> {
    let bytes = parse_hex_bytes(value).map_err(|error| match error {
        hex::FromHexError::InvalidHexCharacter { c, .. } => CliConfigError::InvalidHexByte {
            value: c.to_string(),
        },
        hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
            CliConfigError::InvalidHexLength
        }
    })?;
    if bytes.is_empty() {
        return Err(CliConfigError::EmptyInput);
    }
    Ok(bytes)
}
