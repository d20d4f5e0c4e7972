use std::fmt::{self, Display, Formatter};

use crate::handlers::Frame;
use crate::utils::format_hex;

use super::painter::Painter;
use super::table::Table;

/// Renders one encoded frame field by field.
pub(crate) struct FrameView<'a> {
    command: &'a str,
    frame: &'a Frame,
    description: Option<&'a str>,
    painter: &'a Painter,
}

impl<'a> FrameView<'a> {
    pub(crate) fn new(
        command: &'a str,
        frame: &'a Frame,
        description: Option<&'a str>,
        painter: &'a Painter,
    ) -> Self {
        Self {
            command,
            frame,
            description,
            painter,
        }
    }
}

impl Display for FrameView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let table = Table::key_value(
            self.painter,
            vec![
                ("description", self.description.unwrap_or("-").to_string()),
                ("sequence", self.frame.sequence().to_string()),
                ("destination", self.frame.destination().to_string()),
                ("length", self.frame.declared_len().to_string()),
                ("payload", format_hex(self.frame.payload())),
                ("crc", self.painter.crc(self.frame)),
            ],
        );
        write!(f, "{}", self.painter.heading(format!("{}:", self.command)))?;
        write!(f, "\n{}", self.painter.value(format_hex(self.frame.as_bytes())))?;
        write!(f, "\n{table}")
    }
}
