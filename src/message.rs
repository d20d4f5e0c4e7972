use serde::Serialize;
use serde_with::hex::Hex;
use serde_with::serde_as;
use strum_macros::Display;
use time::OffsetDateTime;

use crate::handlers::{CommandRegistry, Direction, Frame, FrameCodecError, ParsedPayload};
use crate::hw::DecodeContext;
use crate::protocol::Destination;

/// Which side produced a message.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    /// Written by this host.
    #[strum(to_string = "host")]
    Host,
    /// Received from the TAP-in console.
    #[strum(to_string = "console")]
    Console,
}

impl MessageSource {
    /// Returns the parser direction for this source.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Host => Direction::Sent,
            Self::Console => Direction::Received,
        }
    }
}

/// One frame delivered to the driver's consumer, already parsed.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TapInMessage {
    /// Per-driver sequence number, unique within one driver.
    pub id: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub source: MessageSource,
    #[serde_as(as = "Hex")]
    pub raw: Vec<u8>,
    pub parsed: ParsedPayload,
}

impl TapInMessage {
    /// Wraps and parses raw bytes.
    #[must_use]
    pub fn new(
        id: u64,
        source: MessageSource,
        raw: Vec<u8>,
        context: &DecodeContext<'_>,
    ) -> Self {
        let parsed = CommandRegistry::dispatch(&raw, source.direction(), context);
        Self {
            id,
            timestamp: OffsetDateTime::now_utc(),
            source,
            raw,
            parsed,
        }
    }

    /// Returns the typed frame view of the raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes are not a well-formed frame (e.g. raw writes).
    pub fn frame(&self) -> Result<Frame, FrameCodecError> {
        Frame::from_bytes(self.raw.clone())
    }

    /// Returns the header destination, when the bytes carry a header.
    #[must_use]
    pub fn destination(&self) -> Option<Destination> {
        match self.raw.as_slice() {
            [_, _, low, high, ..] => Some(Destination::from(u16::from_le_bytes([*low, *high]))),
            _ => None,
        }
    }
}
