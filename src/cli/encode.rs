use std::io;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use serde::Serialize;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;

use crate::cli::OutputFormat;
use crate::error::CliConfigError;
use crate::handlers::{Frame, focus_number_to_byte};
use crate::hw::{FOCUS_ROWS, FocusColumn, LensSettings, MemoryTransport, Setting, TapInDriver};
use crate::message::TapInMessage;

use super::ui::{FrameView, Painter, write_json};

/// Arguments for the `encode` command.
#[derive(Debug, clap::Args)]
pub struct EncodeArgs {
    #[command(subcommand)]
    request: EncodeRequest,
}

impl EncodeArgs {
    #[must_use]
    pub fn new(request: EncodeRequest) -> Self {
        Self { request }
    }
}

/// Command to frame.
#[derive(Debug, Clone, Subcommand)]
pub enum EncodeRequest {
    /// Power the lens on.
    PowerOn,
    /// Power the lens off.
    PowerOff,
    /// Ask the console whether a lens is attached.
    LensAttached,
    /// Request console or lens status.
    Status {
        #[arg(long, value_enum, default_value_t = StatusTarget::Console)]
        target: StatusTarget,
    },
    /// Request the lens settings.
    GetSettings,
    /// Write new lens settings.
    SetSettings(SetSettingsArgs),
}

impl EncodeRequest {
    fn name(&self) -> &'static str {
        match self {
            Self::PowerOn => "power-on",
            Self::PowerOff => "power-off",
            Self::LensAttached => "lens-attached",
            Self::Status {
                target: StatusTarget::Console,
            } => "console-status",
            Self::Status {
                target: StatusTarget::Lens,
            } => "lens-status",
            Self::GetSettings => "get-settings",
            Self::SetSettings(_args) => "set-settings",
        }
    }
}

/// Status request destination.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum StatusTarget {
    Lens,
    Console,
}

/// Settings written by `encode set-settings`.
#[derive(Debug, Clone, clap::Args)]
pub struct SetSettingsArgs {
    /// Full-time manual focus override: -1 off, 0 low, 1 normal, 2 high.
    #[arg(
        long,
        default_value_t = 1,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i16).range(-1..=2)
    )]
    ftm: i16,
    /// Vibration compensation mode.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    vc_mode: u8,
    /// Focus adjustment as `COLUMN:ROW=VALUE`, e.g. `short:0=-5`. Repeatable.
    #[arg(long = "focus", value_parser = parse_focus_entry)]
    focus: Vec<FocusEntry>,
}

impl SetSettingsArgs {
    /// Creates settings arguments with no focus adjustments.
    #[must_use]
    pub fn new(ftm: i16, vc_mode: u8) -> Self {
        Self {
            ftm,
            vc_mode,
            focus: Vec::new(),
        }
    }

    fn to_settings(&self) -> LensSettings {
        let mut settings = LensSettings {
            full_time_manual_focus_override: Setting {
                enabled: true,
                value: self.ftm,
            },
            vc_mode: Some(self.vc_mode),
            ..LensSettings::default()
        };
        for entry in &self.focus {
            settings.focus_values.set(entry.column, entry.row, entry.byte);
        }
        settings
    }
}

/// One focus grid assignment.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FocusEntry {
    column: FocusColumn,
    row: usize,
    byte: u8,
}

fn parse_focus_entry(value: &str) -> Result<FocusEntry, CliConfigError> {
    let invalid = || CliConfigError::InvalidFocusEntry {
        value: value.to_string(),
    };
    let (column, rest) = value.split_once(':').ok_or_else(invalid)?;
    let (row, number) = rest.split_once('=').ok_or_else(invalid)?;
    let column = FocusColumn::iter()
        .find(|candidate| candidate.to_string().eq_ignore_ascii_case(column.trim()))
        .ok_or_else(invalid)?;
    let row: usize = row.trim().parse().map_err(|_error| invalid())?;
    if row >= FOCUS_ROWS {
        return Err(invalid());
    }
    let number: i32 = number.trim().parse().map_err(|_error| invalid())?;
    let byte = focus_number_to_byte(number).map_err(|_error| invalid())?;
    Ok(FocusEntry { column, row, byte })
}

/// JSON result emitted by `encode`.
#[derive(Debug, Serialize)]
struct EncodeResult<'a> {
    command: &'static str,
    description: Option<&'a str>,
    frame: &'a Frame,
}

/// Executes the `encode` command.
pub(crate) async fn run<W>(
    args: &EncodeArgs,
    out: &mut W,
    output_format: OutputFormat,
    use_colour: bool,
) -> Result<()>
where
    W: io::Write,
{
    let message = encode_request(&args.request).await?;
    let frame = message
        .frame()
        .context("driver wrote an unframed command")?;
    let description = message.parsed.human.as_deref();

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(use_colour);
            writeln!(
                out,
                "{}",
                FrameView::new(args.request.name(), &frame, description, &painter)
            )?;
        }
        OutputFormat::Json => write_json(
            out,
            &EncodeResult {
                command: args.request.name(),
                description,
                frame: &frame,
            },
        )?,
    }
    Ok(())
}

/// Runs `request` against an in-memory driver and returns the echoed host message.
async fn encode_request(request: &EncodeRequest) -> Result<TapInMessage> {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let mut driver = TapInDriver::new(MemoryTransport::new());
    driver.set_handler(move |message| {
        let _ignored = sender.send(message);
    });

    match request {
        EncodeRequest::PowerOn => driver.power_on().await?,
        EncodeRequest::PowerOff => driver.power_off().await?,
        EncodeRequest::LensAttached => driver.check_lens_attached().await?,
        EncodeRequest::Status {
            target: StatusTarget::Console,
        } => driver.get_status().await?,
        EncodeRequest::Status {
            target: StatusTarget::Lens,
        } => driver.get_status_lens().await?,
        EncodeRequest::GetSettings => driver.get_settings().await?,
        EncodeRequest::SetSettings(settings) => {
            driver.update_settings(&settings.to_settings()).await?;
        }
    }

    receiver
        .try_recv()
        .context("driver did not echo the written frame")
}
