use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::cli::OutputFormat;
use crate::error::CliConfigError;
use crate::firmware::FirmwareDecryptor;

use super::ui::{Painter, Progress, Table, write_json};

/// Arguments for the `decrypt` command.
#[derive(Debug, clap::Args)]
pub struct DecryptArgs {
    /// Encrypted firmware image.
    #[arg(long)]
    input: PathBuf,
    /// Where to write the decrypted image.
    #[arg(long)]
    output: PathBuf,
    /// Device key as 64 hex characters.
    #[arg(long, conflicts_with = "lens_xml")]
    key: Option<String>,
    /// Lens metadata file carrying the device key.
    #[arg(long)]
    lens_xml: Option<PathBuf>,
}

impl DecryptArgs {
    /// Creates decrypt arguments using an explicit device key.
    #[must_use]
    pub fn with_key(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            key: Some(key.into()),
            lens_xml: None,
        }
    }

    /// Creates decrypt arguments reading the device key from lens metadata.
    #[must_use]
    pub fn with_lens_xml(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        lens_xml: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            key: None,
            lens_xml: Some(lens_xml.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct DecryptResult<'a> {
    input: &'a Path,
    output: &'a Path,
    input_bytes: usize,
    output_bytes: usize,
}

/// Executes the `decrypt` command.
#[instrument(skip_all, level = "info", fields(input = %args.input.display()))]
pub(crate) fn run<W>(
    args: &DecryptArgs,
    out: &mut W,
    output_format: OutputFormat,
    use_colour: bool,
    show_progress: bool,
) -> Result<()>
where
    W: io::Write,
{
    let mut decryptor = decryptor_for(args)?;
    let input = read_file(&args.input)?;

    let progress = Progress::new(show_progress, "Decrypting firmware");
    let decrypted = decryptor.decrypt_with_progress(&input, |percent| progress.set_percent(percent));
    progress.finish();
    let decrypted = decrypted
        .with_context(|| format!("failed to decrypt `{}`", args.input.display()))?;

    fs::write(&args.output, &decrypted).map_err(|source| CliConfigError::WriteFile {
        path: args.output.clone(),
        source,
    })?;
    info!(output_bytes = decrypted.len(), "firmware decrypted");

    let result = DecryptResult {
        input: &args.input,
        output: &args.output,
        input_bytes: input.len(),
        output_bytes: decrypted.len(),
    };
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(use_colour);
            let table = Table::key_value(
                &painter,
                vec![
                    ("input", painter.value(result.input.display().to_string())),
                    ("output", painter.value(result.output.display().to_string())),
                    ("input_bytes", result.input_bytes.to_string()),
                    ("output_bytes", result.output_bytes.to_string()),
                ],
            );
            writeln!(out, "{}", painter.success("Firmware decrypted:"))?;
            writeln!(out, "{table}")?;
        }
        OutputFormat::Json => write_json(out, &result)?,
    }
    Ok(())
}

fn decryptor_for(args: &DecryptArgs) -> Result<FirmwareDecryptor> {
    if let Some(key) = &args.key {
        return Ok(FirmwareDecryptor::new(key.trim())?);
    }
    let Some(path) = &args.lens_xml else {
        return Err(CliConfigError::MissingKey.into());
    };
    let document = String::from_utf8_lossy(&read_file(path)?).into_owned();
    FirmwareDecryptor::from_lens_document(&document)
        .with_context(|| format!("failed to read lens metadata `{}`", path.display()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, CliConfigError> {
    fs::read(path).map_err(|source| CliConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}
