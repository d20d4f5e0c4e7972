use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::hw::{DecodeContext, LensSettings};
use crate::protocol::{Opcode, opcode_from_payload};
use crate::utils::format_hex;

use super::device_error::{DeviceErrorCode, parse_error_response};
use super::frame_codec::{HEADER_LEN, TRAILER_LEN};
use super::power::{parse_lens_attached, parse_power_off, parse_power_on};
use super::settings::{parse_get_settings, parse_set_settings};
use super::status::{StatusDetails, parse_status};

/// Which side of the link produced a frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub enum Direction {
    /// Echo of a frame this host wrote.
    Sent,
    /// Frame received from the console.
    Received,
}

impl Direction {
    /// Returns `true` for outbound echoes.
    #[must_use]
    pub const fn was_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Structured command details, one shape per opcode.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadDetails {
    LensAttached { attached: bool },
    PowerOn { power_on: bool },
    PowerOff { power_off: bool },
    Status(StatusDetails),
    Settings(LensSettings),
    /// Settings payload too short to decode; carries what could be read.
    PartialSettings {
        ftm_override: Option<i16>,
        payload_len: usize,
    },
    DeviceError { code: DeviceErrorCode },
    /// Payload that no parser could interpret.
    Raw {
        payload: Vec<u8>,
        error: Option<String>,
    },
}

/// Decoded command result.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ParsedPayload {
    /// First payload byte, when present.
    pub cmd: Option<u8>,
    /// Short single-line summary.
    pub human: Option<String>,
    pub details: Option<PayloadDetails>,
}

impl ParsedPayload {
    pub(crate) fn new(cmd: u8) -> Self {
        Self {
            cmd: Some(cmd),
            human: None,
            details: None,
        }
    }

    pub(crate) fn with_human(mut self, human: impl Into<String>) -> Self {
        self.human = Some(human.into());
        self
    }

    pub(crate) fn with_details(mut self, details: PayloadDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns the known opcode for [`Self::cmd`].
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        self.cmd.and_then(Opcode::from_byte)
    }
}

/// Errors raised by individual payload parsers; dispatch turns them into fallback records.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ParseError {
    #[error("frame of {actual} bytes cannot carry a payload")]
    FrameTooShort { actual: usize },
    #[error("settings payload of {actual} bytes is shorter than {expected}")]
    SettingsTooShort { expected: usize, actual: usize },
}

/// Signature shared by all opcode parsers.
pub(crate) type CommandParser =
    fn(&[u8], Direction, &DecodeContext<'_>) -> Result<ParsedPayload, ParseError>;

static PARSERS: LazyLock<HashMap<Opcode, CommandParser>> = LazyLock::new(|| {
    HashMap::from([
        (Opcode::Error, parse_error_response as CommandParser),
        (Opcode::IsLensAttached, parse_lens_attached as CommandParser),
        (Opcode::PowerOn, parse_power_on as CommandParser),
        (Opcode::PowerOff, parse_power_off as CommandParser),
        (Opcode::GetStatus, parse_status as CommandParser),
        (Opcode::GetSettings, parse_get_settings as CommandParser),
        (Opcode::SetSettings, parse_set_settings as CommandParser),
    ])
});

/// Returns the payload region `frame[6..len - 3]` without consulting the length field.
///
/// # Errors
///
/// Returns [`ParseError::FrameTooShort`] when the frame cannot hold a header and trailer.
pub(crate) fn payload_of(frame: &[u8]) -> Result<&[u8], ParseError> {
    let end = frame
        .len()
        .checked_sub(TRAILER_LEN)
        .filter(|end| *end >= HEADER_LEN)
        .ok_or(ParseError::FrameTooShort {
            actual: frame.len(),
        })?;
    Ok(&frame[HEADER_LEN..end])
}

/// Maps opcodes to their payload parsers.
pub struct CommandRegistry;

impl CommandRegistry {
    /// Returns `true` when a dedicated parser is registered for `opcode`.
    ///
    /// ```
    /// use tapin::{CommandRegistry, Opcode};
    ///
    /// assert!(CommandRegistry::is_registered(Opcode::GetStatus));
    /// assert!(!CommandRegistry::is_registered(Opcode::UpdateFirmware));
    /// ```
    #[must_use]
    pub fn is_registered(opcode: Opcode) -> bool {
        PARSERS.contains_key(&opcode)
    }

    /// Parses one complete frame. Never fails: unknown opcodes and parser errors yield a
    /// fallback record carrying the raw payload.
    ///
    /// ```
    /// use tapin::{CommandRegistry, DecodeContext, Direction, PayloadDetails};
    ///
    /// let frame = [0x0F, 0x03, 0x01, 0x00, 0x02, 0x00, 0xF8, 0x01, 0xC1, 0x23, 0xF0];
    /// let parsed = CommandRegistry::dispatch(&frame, Direction::Received, &DecodeContext::default());
    /// assert_eq!(Some(0xF8), parsed.cmd);
    /// assert_eq!(Some(PayloadDetails::PowerOn { power_on: true }), parsed.details);
    /// ```
    #[instrument(skip_all, level = "debug", fields(frame_len = frame.len(), ?direction))]
    pub fn dispatch(
        frame: &[u8],
        direction: Direction,
        context: &DecodeContext<'_>,
    ) -> ParsedPayload {
        let payload = match payload_of(frame) {
            Ok(payload) => payload,
            Err(parse_error) => {
                error!(%parse_error, "frame has no payload region");
                return fallback(frame, Some(&parse_error));
            }
        };
        debug!(payload = %format_hex(payload), "parsing frame payload");

        let parser = opcode_from_payload(payload)
            .and_then(Opcode::from_byte)
            .and_then(|opcode| PARSERS.get(&opcode));
        let Some(parser) = parser else {
            error!(payload = %format_hex(payload), "no parser for payload");
            return fallback(payload, None);
        };

        match parser(frame, direction, context) {
            Ok(parsed) => parsed,
            Err(parse_error) => {
                error!(%parse_error, "payload parser failed");
                fallback(payload, Some(&parse_error))
            }
        }
    }
}

fn fallback(payload: &[u8], error: Option<&ParseError>) -> ParsedPayload {
    ParsedPayload {
        cmd: opcode_from_payload(payload),
        human: Some("Payload parsing failed!".to_string()),
        details: Some(PayloadDetails::Raw {
            payload: payload.to_vec(),
            error: error.map(ToString::to_string),
        }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn dispatch(frame: &[u8], direction: Direction) -> ParsedPayload {
        CommandRegistry::dispatch(frame, direction, &DecodeContext::default())
    }

    #[test]
    fn payload_of_ignores_length_field() {
        let frame = [0x0F, 0x04, 0x01, 0x00, 0x01, 0x00, 0xF9, 0x01, 0xB4, 0x09, 0xF0];
        assert_eq!(&[0xF9, 0x01], payload_of(&frame).expect("frame has a payload region"));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0x0F, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0])]
    fn payload_of_rejects_short_frames(#[case] frame: &[u8]) {
        assert_matches!(payload_of(frame), Err(ParseError::FrameTooShort { .. }));
    }

    #[test]
    fn unknown_opcode_falls_back_to_raw_payload() {
        let frame = [0x0F, 0x01, 0x01, 0x00, 0x02, 0x00, 0xEE, 0x42, 0x00, 0x00, 0xF0];
        let parsed = dispatch(&frame, Direction::Received);
        assert_eq!(
            ParsedPayload {
                cmd: Some(0xEE),
                human: Some("Payload parsing failed!".to_string()),
                details: Some(PayloadDetails::Raw {
                    payload: vec![0xEE, 0x42],
                    error: None,
                }),
            },
            parsed
        );
    }

    #[test]
    fn update_firmware_is_not_registered() {
        let frame = [0x0F, 0x01, 0x01, 0x00, 0x01, 0x00, 0xFD, 0x00, 0x00, 0xF0];
        let parsed = dispatch(&frame, Direction::Received);
        assert_eq!(Some(0xFD), parsed.cmd);
        assert_matches!(parsed.details, Some(PayloadDetails::Raw { .. }));
    }

    #[test]
    fn empty_payload_falls_back_without_opcode() {
        let frame = [0x0F, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0];
        let parsed = dispatch(&frame, Direction::Received);
        assert_eq!(None, parsed.cmd);
        assert_eq!(
            Some(PayloadDetails::Raw {
                payload: Vec::new(),
                error: None,
            }),
            parsed.details
        );
    }

    #[test]
    fn truncated_settings_keep_their_opcode_record() {
        let frame = [0x0F, 0x01, 0x00, 0x00, 0x02, 0x00, 0xFC, 0x02, 0x00, 0x00, 0xF0];
        let parsed = dispatch(&frame, Direction::Received);
        assert_eq!(
            ParsedPayload {
                cmd: Some(0xFC),
                human: Some("Lens Settings".to_string()),
                details: Some(PayloadDetails::PartialSettings {
                    ftm_override: Some(1),
                    payload_len: 2,
                }),
            },
            parsed
        );
    }

    #[test]
    fn too_short_frame_surfaces_raw_bytes() {
        let parsed = dispatch(&[0x0F, 0x01], Direction::Received);
        assert_eq!(Some("Payload parsing failed!".to_string()), parsed.human);
        assert_matches!(
            parsed.details,
            Some(PayloadDetails::Raw { payload, error: Some(_) }) if payload == vec![0x0F, 0x01]
        );
    }

    #[test]
    fn registered_opcodes_cover_everything_but_firmware_update() {
        use strum::IntoEnumIterator;

        let missing: Vec<Opcode> = Opcode::iter()
            .filter(|opcode| !CommandRegistry::is_registered(*opcode))
            .collect();
        assert_eq!(vec![Opcode::UpdateFirmware], missing);
    }

    #[test]
    fn parsed_payload_serializes_with_tagged_details() {
        let parsed = ParsedPayload::new(0xF7)
            .with_human("Lens attached")
            .with_details(PayloadDetails::LensAttached { attached: true });
        let json = serde_json::to_string(&parsed).expect("parsed payload should serialize");
        insta::assert_snapshot!(json, @r#"{"cmd":247,"human":"Lens attached","details":{"kind":"lens_attached","attached":true}}"#);
    }
}
