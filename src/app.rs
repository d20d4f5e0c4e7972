use std::io;

use anyhow::Result;
use tracing::instrument;

use crate::cli::{Command, LogLevel, OutputFormat};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Runs the CLI command against the real terminal.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = tapin::Args::try_parse_from(["tapin", "encode", "power-off"])?;
/// let mut out = Vec::new();
/// tapin::run(args.into_command(), &mut out, tapin::OutputFormat::Json).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
pub async fn run<W>(command: Command, out: &mut W, output_format: OutputFormat) -> Result<()>
where
    W: io::Write,
{
    run_with_log_level(command, out, output_format, None).await
}

/// Runs the CLI command with an explicit log-level override.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
pub async fn run_with_log_level<W>(
    command: Command,
    out: &mut W,
    output_format: OutputFormat,
    log_level: Option<LogLevel>,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(command, out, &SystemTerminalClient, output_format, log_level).await
}

/// Runs the CLI command with an injected terminal client.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// struct FakeTerminal;
/// impl tapin::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let args = tapin::Args::try_parse_from([
///     "tapin",
///     "decode",
///     "0F 03 01 00 02 00 F8 01 C1 23 F0",
/// ])?;
/// let mut out = Vec::new();
/// tapin::run_with_clients(
///     args.into_command(),
///     &mut out,
///     &FakeTerminal,
///     tapin::OutputFormat::Pretty,
///     None,
/// )
/// .await?;
/// assert!(String::from_utf8(out)?.contains("Lens powered on"));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the command fails, or
/// output writing fails.
#[instrument(
    skip(command, out, terminal_client),
    level = "info",
    fields(command = %command.name(), ?log_level)
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
    log_level: Option<LogLevel>,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "tapin",
        terminal_client.stderr_is_terminal(),
        log_level.map(LogLevel::as_level_filter),
    )?;

    let use_colour = terminal_client.stdout_is_terminal();
    match command {
        Command::Decode(args) => crate::cli::decode::run(&args, out, output_format, use_colour),
        Command::Encode(args) => {
            crate::cli::encode::run(&args, out, output_format, use_colour).await
        }
        Command::Decrypt(args) => crate::cli::decrypt::run(
            &args,
            out,
            output_format,
            use_colour,
            terminal_client.stderr_is_terminal(),
        ),
    }
}
