use serde::Serialize;
use tracing::{error, warn};

use crate::hw::DecodeContext;
use crate::protocol::Opcode;
use crate::utils::format_hex;

use super::registry::{Direction, ParseError, ParsedPayload, PayloadDetails, payload_of};

/// Error codes carried in ERROR responses.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub enum DeviceErrorCode {
    /// `0x10`: seen when powering on a powered lens or querying an unpowered one.
    PowerOn,
    /// Any code not yet classified.
    Unknown(u8),
}

impl DeviceErrorCode {
    /// Maps a raw error byte.
    #[must_use]
    pub const fn from_byte(value: u8) -> Self {
        match value {
            0x10 => Self::PowerOn,
            other => Self::Unknown(other),
        }
    }
}

/// Parses ERROR responses (`[0xFF, code]`).
pub(crate) fn parse_error_response(
    frame: &[u8],
    direction: Direction,
    _context: &DecodeContext<'_>,
) -> Result<ParsedPayload, ParseError> {
    let payload = payload_of(frame)?;
    let parsed = ParsedPayload::new(Opcode::Error.byte());

    if direction.was_sent() {
        warn!("ERROR frames are never sent to the console");
        return Ok(parsed);
    }

    let [_, code] = payload else {
        warn!(len = payload.len(), "invalid error payload length");
        return Ok(parsed);
    };

    let code = DeviceErrorCode::from_byte(*code);
    let parsed = match code {
        DeviceErrorCode::PowerOn => parsed.with_human("Error Powering On Lens"),
        DeviceErrorCode::Unknown(_) => {
            error!(?code, frame = %format_hex(frame), "unknown device error");
            parsed.with_human("Unknown Error")
        }
    };
    Ok(parsed.with_details(PayloadDetails::DeviceError { code }))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::handlers::CommandRegistry;

    fn error_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x0F, 0x05, 0x00, 0x00, payload.len() as u8, 0x00];
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&[0x00, 0x00, 0xF0]);
        frame
    }

    #[test]
    fn power_on_error_carries_its_code() {
        let parsed = CommandRegistry::dispatch(
            &error_frame(&[0xFF, 0x10]),
            Direction::Received,
            &DecodeContext::default(),
        );
        assert_eq!(
            ParsedPayload {
                cmd: Some(0xFF),
                human: Some("Error Powering On Lens".to_string()),
                details: Some(PayloadDetails::DeviceError {
                    code: DeviceErrorCode::PowerOn,
                }),
            },
            parsed
        );
    }

    #[test]
    fn unknown_error_keeps_code() {
        let parsed = CommandRegistry::dispatch(
            &error_frame(&[0xFF, 0x22]),
            Direction::Received,
            &DecodeContext::default(),
        );
        assert_eq!(Some("Unknown Error".to_string()), parsed.human);
        assert_eq!(
            Some(PayloadDetails::DeviceError {
                code: DeviceErrorCode::Unknown(0x22)
            }),
            parsed.details
        );
    }

    #[test]
    fn wrong_length_yields_opcode_only() {
        let parsed = CommandRegistry::dispatch(
            &error_frame(&[0xFF]),
            Direction::Received,
            &DecodeContext::default(),
        );
        assert_eq!(ParsedPayload::new(0xFF), parsed);
    }

    #[test]
    fn sent_error_is_not_interpreted() {
        let parsed = CommandRegistry::dispatch(
            &error_frame(&[0xFF, 0x10]),
            Direction::Sent,
            &DecodeContext::default(),
        );
        assert_eq!(ParsedPayload::new(0xFF), parsed);
    }
}
