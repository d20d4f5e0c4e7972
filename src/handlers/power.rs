use tracing::warn;

use crate::hw::DecodeContext;
use crate::protocol::Opcode;

use super::registry::{Direction, ParseError, ParsedPayload, PayloadDetails, payload_of};

/// Parses IS_LENS_ATTACHED requests (1 byte) and responses (2 bytes).
pub(crate) fn parse_lens_attached(
    frame: &[u8],
    _direction: Direction,
    _context: &DecodeContext<'_>,
) -> Result<ParsedPayload, ParseError> {
    let payload = payload_of(frame)?;
    let parsed = ParsedPayload::new(Opcode::IsLensAttached.byte());

    Ok(match payload {
        [_] => parsed.with_human("Request for lens attached status"),
        [_, 0x00] => parsed
            .with_human("No lens attached")
            .with_details(PayloadDetails::LensAttached { attached: false }),
        [_, 0x01] => parsed
            .with_human("Lens attached")
            .with_details(PayloadDetails::LensAttached { attached: true }),
        [_, status] => {
            warn!(status, "unexpected lens attached status");
            parsed
        }
        _ => {
            warn!(len = payload.len(), "invalid lens attached payload length");
            parsed
        }
    })
}

/// Parses POWER_ON request echoes and responses.
pub(crate) fn parse_power_on(
    frame: &[u8],
    direction: Direction,
    _context: &DecodeContext<'_>,
) -> Result<ParsedPayload, ParseError> {
    let payload = payload_of(frame)?;
    let parsed = ParsedPayload::new(Opcode::PowerOn.byte());

    if direction.was_sent() {
        return Ok(parsed
            .with_human("Request lens power on")
            .with_details(PayloadDetails::PowerOn { power_on: false }));
    }

    Ok(match payload {
        [_, 0x00] => parsed
            .with_human("Power on Failed")
            .with_details(PayloadDetails::PowerOn { power_on: false }),
        [_, 0x01] => parsed
            .with_human("Lens powered on")
            .with_details(PayloadDetails::PowerOn { power_on: true }),
        [_, status] => {
            warn!(status, "unexpected power on status");
            parsed
        }
        _ => {
            warn!(len = payload.len(), "invalid power on payload length");
            parsed
        }
    })
}

/// Parses POWER_OFF request echoes and responses.
pub(crate) fn parse_power_off(
    frame: &[u8],
    direction: Direction,
    _context: &DecodeContext<'_>,
) -> Result<ParsedPayload, ParseError> {
    let payload = payload_of(frame)?;
    let parsed = ParsedPayload::new(Opcode::PowerOff.byte());

    if direction.was_sent() {
        return Ok(parsed.with_human("Request lens power off"));
    }

    Ok(match payload {
        [_, 0x00] => parsed
            .with_human("Power off failed")
            .with_details(PayloadDetails::PowerOff { power_off: false }),
        [_, 0x01] => parsed
            .with_human("Lens powered off")
            .with_details(PayloadDetails::PowerOff { power_off: true }),
        [_, status] => {
            warn!(status, "unexpected power off status");
            parsed
        }
        _ => {
            warn!(len = payload.len(), "invalid power off payload length");
            parsed
        }
    })
}
