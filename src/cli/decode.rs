use std::io;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::cli::OutputFormat;
use crate::cli::command::hex_argument;
use crate::hw::{
    AdapterInfo, DeviceState, DirectoryCatalog, FollowUp, LensInfo, LensSettings,
    MemoryTransport, TapInDriver,
};
use crate::message::TapInMessage;

use super::ui::{DecodeReportView, Painter, write_json};

/// Arguments for the `decode` command.
#[derive(Debug, clap::Args)]
pub struct DecodeArgs {
    /// Directory holding `lensinfo_<model><mount>.xml` metadata files.
    #[arg(long)]
    lens_dir: Option<PathBuf>,
    /// Captured console bytes as hex, one chunk per argument; frames may span chunks.
    #[arg(required = true)]
    chunks: Vec<String>,
}

impl DecodeArgs {
    /// Creates decode arguments for hex chunks.
    #[must_use]
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            lens_dir: None,
            chunks,
        }
    }

    /// Resolves lens metadata from `lens_dir`.
    #[must_use]
    pub fn with_lens_dir(mut self, lens_dir: impl Into<PathBuf>) -> Self {
        self.lens_dir = Some(lens_dir.into());
        self
    }
}

/// One decoded message and the commands it would trigger.
#[derive(Debug, Serialize)]
pub(crate) struct DecodedMessage {
    #[serde(flatten)]
    pub(crate) message: TapInMessage,
    pub(crate) follow_ups: Vec<FollowUp>,
}

/// Everything learned from one capture.
#[derive(Debug, Serialize)]
pub(crate) struct DecodeReport {
    pub(crate) messages: Vec<DecodedMessage>,
    pub(crate) adapter: AdapterInfo,
    pub(crate) lens: Option<LensInfo>,
    pub(crate) settings: Option<LensSettings>,
    pub(crate) buffered_bytes: usize,
}

/// Executes the `decode` command.
pub(crate) fn run<W>(
    args: &DecodeArgs,
    out: &mut W,
    output_format: OutputFormat,
    use_colour: bool,
) -> Result<()>
where
    W: io::Write,
{
    let chunks = args
        .chunks
        .iter()
        .map(|chunk| hex_argument(chunk))
        .collect::<Result<Vec<_>, _>>()?;
    let report = decode_chunks(&chunks, args.lens_dir.clone().map(DirectoryCatalog::new));

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(use_colour);
            writeln!(out, "{}", DecodeReportView::new(&report, &painter))?;
        }
        OutputFormat::Json => write_json(out, &report)?,
    }
    Ok(())
}

/// Feeds `chunks` through a driver, applying every message to a fresh device state.
#[instrument(skip_all, level = "debug", fields(chunk_count = chunks.len()))]
pub(crate) fn decode_chunks(chunks: &[Vec<u8>], catalog: Option<DirectoryCatalog>) -> DecodeReport {
    let mut state = match catalog {
        Some(catalog) => DeviceState::new().with_catalog(catalog),
        None => DeviceState::new(),
    };
    state.connect();

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let mut driver = TapInDriver::new(MemoryTransport::new());
    driver.set_handler(move |message| {
        if sender.send(message).is_err() {
            debug!("decode receiver dropped");
        }
    });

    let mut messages = Vec::new();
    for chunk in chunks {
        for frame in driver.receive(chunk) {
            driver.deliver(frame, &state.context());
            while let Ok(message) = receiver.try_recv() {
                let follow_ups = state.apply(&message);
                messages.push(DecodedMessage {
                    message,
                    follow_ups,
                });
            }
        }
    }

    let buffered_bytes = driver.buffered_len();
    if buffered_bytes > 0 {
        warn!(buffered_bytes, "capture ends inside a frame");
    }

    DecodeReport {
        messages,
        adapter: state.adapter().clone(),
        lens: state.lens().cloned(),
        settings: state.settings().copied(),
        buffered_bytes,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::handlers::PayloadDetails;
    use crate::message::MessageSource;

    const LENS_ATTACHED: [u8; 11] = [
        0x0F, 0x02, 0x01, 0x00, 0x02, 0x00, 0xF7, 0x01, 0x9E, 0x8B, 0xF0,
    ];
    const POWER_ON_OK: [u8; 11] = [
        0x0F, 0x03, 0x01, 0x00, 0x02, 0x00, 0xF8, 0x01, 0xC1, 0x23, 0xF0,
    ];

    const LENS_STATUS: [u8; 95] = [
        0x0F, 0x06, 0x00, 0x00, 0x56, 0x00, 0xFA, 0x00, 0x00, 0x00, 0x46, 0x30, 0x31, 0x33, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x30, 0x30, 0x30,
        0x31, 0x39, 0x30, 0x33, 0x30, 0x30, 0x30, 0x30, 0x37, 0x33, 0x31, 0x35, 0x03, 0x01, 0x02,
        0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x0B, 0x00,
        0x01, 0x03, 0x00, 0x35, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x14, 0xEC, 0x00, 0x00, 0x00,
        0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00,
        0x2D, 0x00, 0x60, 0xE0, 0xF0,
    ];
    const SETTINGS: [u8; 45] = [
        0x0F, 0x07, 0x00, 0x00, 0x24, 0x00, 0xFC, 0x02, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
        0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x8E, 0xAD, 0xF0,
    ];

    #[test]
    fn settings_joined_to_lens_status_decode_with_that_lens() {
        let split = decode_chunks(&[LENS_STATUS.to_vec(), SETTINGS.to_vec()], None);
        let joined = decode_chunks(&[[&LENS_STATUS[..], &SETTINGS[..]].concat()], None);

        let settings = joined.settings.expect("settings should be decoded");
        assert_eq!(split.settings, Some(settings));
        assert_eq!(Some(2), settings.vc_mode);
        assert!(settings.full_time_manual_focus_override.enabled);
        assert!(settings.vc_modes.iter().all(|slot| slot.enabled));
    }

    #[test]
    fn frames_split_across_chunks_decode_in_order() {
        let mut capture = LENS_ATTACHED.to_vec();
        capture.extend_from_slice(&POWER_ON_OK);
        let chunks = vec![capture[..7].to_vec(), capture[7..15].to_vec(), capture[15..].to_vec()];

        let report = decode_chunks(&chunks, None);
        let summary: Vec<(u64, MessageSource, Vec<FollowUp>)> = report
            .messages
            .iter()
            .map(|decoded| (decoded.message.id, decoded.message.source, decoded.follow_ups.clone()))
            .collect();
        assert_eq!(
            vec![
                (0, MessageSource::Console, vec![FollowUp::PowerOn]),
                (1, MessageSource::Console, vec![FollowUp::GetLensStatus]),
            ],
            summary
        );
        assert_eq!(Some(true), report.adapter.lens_attached);
        assert!(report.adapter.connected);
        assert_eq!(0, report.buffered_bytes);
    }

    #[test]
    fn trailing_partial_frame_is_reported() {
        let report = decode_chunks(&[POWER_ON_OK[..4].to_vec()], None);
        assert!(report.messages.is_empty());
        assert_eq!(4, report.buffered_bytes);
    }

    #[test]
    fn run_writes_json_report() {
        let args = DecodeArgs::new(vec!["0F 03 01 00 02 00 F8 01 C1 23 F0".to_string()]);
        let mut out = Vec::new();
        run(&args, &mut out, OutputFormat::Json, false).expect("decode should succeed");

        let value: serde_json::Value =
            serde_json::from_slice(&out).expect("output should be JSON");
        assert_eq!("console", value["messages"][0]["source"]);
        assert_eq!("0f0301000200f801c123f0", value["messages"][0]["raw"]);
        assert_eq!(
            serde_json::to_value(PayloadDetails::PowerOn { power_on: true })
                .expect("details serialize"),
            value["messages"][0]["parsed"]["details"]
        );
        assert_eq!(serde_json::json!(["get-lens-status"]), value["messages"][0]["follow_ups"]);
    }
}
