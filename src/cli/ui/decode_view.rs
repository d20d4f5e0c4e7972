use std::fmt::{self, Display, Formatter};

use crate::cli::decode::{DecodeReport, DecodedMessage};
use crate::handlers::focus_byte_to_number;
use crate::hw::{AdapterInfo, FOCUS_ROWS, LensInfo, LensSettings};
use crate::utils::format_hex;

use super::painter::Painter;
use super::table::Table;

/// Renders a decoded capture: the message log, then the resulting device state.
pub(crate) struct DecodeReportView<'a> {
    report: &'a DecodeReport,
    painter: &'a Painter,
}

impl<'a> DecodeReportView<'a> {
    pub(crate) fn new(report: &'a DecodeReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }

    fn message_row(&self, decoded: &DecodedMessage) -> Vec<String> {
        let message = &decoded.message;
        let opcode = match (message.parsed.opcode(), message.parsed.cmd) {
            (Some(opcode), _) => opcode.to_string(),
            (None, Some(cmd)) => format!("0x{cmd:02X}"),
            (None, None) => "-".to_string(),
        };
        let summary = match &message.parsed.human {
            Some(human) => self.painter.value(human),
            None => self.painter.muted("-"),
        };
        let next = if decoded.follow_ups.is_empty() {
            self.painter.muted("-")
        } else {
            decoded
                .follow_ups
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        vec![
            message.id.to_string(),
            self.painter.source(message.source),
            opcode,
            summary,
            next,
            message.raw.len().to_string(),
        ]
    }

    fn adapter_table(&self, adapter: &AdapterInfo) -> Table {
        Table::key_value(
            self.painter,
            vec![
                ("connected", adapter.connected.to_string()),
                ("lens_attached", optional(adapter.lens_attached)),
                ("mount", optional(adapter.mount_type)),
                ("firmware_version", optional(adapter.firmware_version)),
                ("hardware_version", optional(adapter.hardware_version)),
                ("connection_version", optional(adapter.connection_version)),
            ],
        )
    }

    fn lens_table(&self, lens: &LensInfo) -> Table {
        let capabilities = [
            ("focus", lens.capabilities.adj_focus),
            ("ftm", lens.capabilities.adj_ftm),
            ("limiter", lens.capabilities.adj_flimit_sw),
            ("vc", lens.capabilities.adj_vc),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect::<Vec<_>>()
        .join(" ");
        let mut rows = vec![
            ("model", self.painter.value(&lens.model)),
            ("serial", lens.serial.clone()),
            ("main_version", format_hex(&lens.versions.main0)),
            ("capabilities", capabilities),
            ("focal_lengths", lens.focus_focal_lengths.to_string()),
            (
                "focus_range",
                format!("{}..={}", lens.adj_focus_min, lens.adj_focus_max),
            ),
        ];
        if let Some(xml) = &lens.xml_data {
            rows.push(("catalog_model", format!("{} {}", xml.model, xml.lens_type)));
        }
        Table::key_value(self.painter, rows)
    }

    fn settings_tables(&self, settings: &LensSettings, focal_lengths: usize) -> (Table, Table) {
        let ftm = &settings.full_time_manual_focus_override;
        let summary = Table::key_value(
            self.painter,
            vec![
                (
                    "ftm_override",
                    if ftm.enabled {
                        ftm.value.to_string()
                    } else {
                        self.painter.muted(format!("{} (locked)", ftm.value))
                    },
                ),
                ("vc_mode", optional(settings.vc_mode)),
                (
                    "vc_slots",
                    settings
                        .vc_modes
                        .iter()
                        .map(|slot| if slot.enabled { "on" } else { "off" })
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
            ],
        );
        let focus_rows = settings
            .focus_values
            .rows(focal_lengths)
            .enumerate()
            .map(|(row, values)| {
                let mut cells = vec![row.to_string()];
                cells.extend(values.iter().map(|byte| signed_focus(*byte)));
                cells
            });
        let focus = Table::grid(["row", "short", "medium", "long"], focus_rows);
        (summary, focus)
    }
}

impl Display for DecodeReportView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let messages = Table::grid(
            ["id", "from", "opcode", "message", "next", "bytes"],
            self.report
                .messages
                .iter()
                .map(|decoded| self.message_row(decoded)),
        );

        write!(f, "{}", self.painter.heading("Messages:"))?;
        if messages.is_empty() {
            write!(f, "\n{}", self.painter.muted("no complete frames in capture"))?;
        } else {
            write!(f, "\n{messages}")?;
        }
        if self.report.buffered_bytes > 0 {
            write!(
                f,
                "\n{}",
                self.painter.warning(format!(
                    "{} trailing byte(s) did not complete a frame",
                    self.report.buffered_bytes
                ))
            )?;
        }

        write!(f, "\n\n{}", self.painter.heading("Adapter:"))?;
        write!(f, "\n{}", self.adapter_table(&self.report.adapter))?;

        if let Some(lens) = &self.report.lens {
            write!(f, "\n\n{}", self.painter.heading("Lens:"))?;
            write!(f, "\n{}", self.lens_table(lens))?;
        }

        if let Some(settings) = &self.report.settings {
            let focal_lengths = self
                .report
                .lens
                .as_ref()
                .map_or(FOCUS_ROWS, |lens| usize::from(lens.focus_focal_lengths));
            let (summary, focus) = self.settings_tables(settings, focal_lengths);
            write!(f, "\n\n{}", self.painter.heading("Settings:"))?;
            write!(f, "\n{summary}")?;
            write!(f, "\n{focus}")?;
        }
        Ok(())
    }
}

fn optional<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

fn signed_focus(byte: u8) -> String {
    focus_byte_to_number(i32::from(byte)).map_or_else(|_error| "?".to_string(), |value| value.to_string())
}
