use thiserror::Error;
use tracing::{instrument, warn};

use crate::hw::{
    DecodeContext, FOCUS_COLUMNS, FOCUS_ROWS, FocusGrid, LensInfo, LensSettings, Setting,
    VcModeSlot,
};
use crate::protocol::Opcode;

use super::registry::{Direction, ParseError, ParsedPayload, PayloadDetails, payload_of};

/// Length of an encoded SET_SETTINGS payload.
pub const SETTINGS_PAYLOAD_LEN: usize = 36;
const FOCUS_OFFSET: usize = 12;
const MIN_DECODE_LEN: usize = 3;
const MAX_VC_MODE: u8 = 3;
/// Reserved bytes that the console expects set to `0x01`.
const RESERVED_MARKERS: [usize; 2] = [6, 10];

/// Errors returned by the signed focus-byte transform.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum FocusByteError {
    #[error("focus byte {value} is outside 0..=255")]
    ByteOutOfRange { value: i32 },
    #[error("focus value {value} is outside -128..=127")]
    ValueOutOfRange { value: i32 },
}

/// Interprets an unsigned focus byte as a signed value.
///
/// ```
/// use tapin::focus_byte_to_number;
///
/// assert_eq!(-20, focus_byte_to_number(0xEC)?);
/// assert_eq!(20, focus_byte_to_number(0x14)?);
/// # Ok::<(), tapin::FocusByteError>(())
/// ```
///
/// # Errors
///
/// Returns [`FocusByteError::ByteOutOfRange`] unless `value` is in `0..=255`.
pub fn focus_byte_to_number(value: i32) -> Result<i8, FocusByteError> {
    let byte = u8::try_from(value).map_err(|_overflow| FocusByteError::ByteOutOfRange { value })?;
    Ok(i8::from_le_bytes([byte]))
}

/// Encodes a signed focus value as its two's-complement byte.
///
/// ```
/// use tapin::focus_number_to_byte;
///
/// assert_eq!(0xF6, focus_number_to_byte(-10)?);
/// assert!(focus_number_to_byte(128).is_err());
/// # Ok::<(), tapin::FocusByteError>(())
/// ```
///
/// # Errors
///
/// Returns [`FocusByteError::ValueOutOfRange`] unless `value` is in `-128..=127`.
pub fn focus_number_to_byte(value: i32) -> Result<u8, FocusByteError> {
    let signed =
        i8::try_from(value).map_err(|_overflow| FocusByteError::ValueOutOfRange { value })?;
    Ok(signed.to_le_bytes()[0])
}

/// Encoder and decoder for GET/SET_SETTINGS payloads.
pub struct SettingsCodec;

impl SettingsCodec {
    /// Builds the fixed 36-byte SET_SETTINGS payload.
    ///
    /// `enabled` flags are not carried on the wire.
    ///
    /// ```
    /// use tapin::{LensSettings, SettingsCodec};
    ///
    /// let payload = SettingsCodec::encode(&LensSettings::default());
    /// assert_eq!(36, payload.len());
    /// assert_eq!([0xFB, 0x01, 0x00], payload[..3]);
    /// ```
    #[must_use]
    pub fn encode(settings: &LensSettings) -> [u8; SETTINGS_PAYLOAD_LEN] {
        let mut payload = [0_u8; SETTINGS_PAYLOAD_LEN];
        payload[0] = Opcode::SetSettings.byte();
        payload[1] = settings
            .full_time_manual_focus_override
            .value
            .wrapping_add(1)
            .to_le_bytes()[0];
        payload[2] = settings
            .vc_mode
            .filter(|mode| *mode <= MAX_VC_MODE)
            .unwrap_or(0);
        for index in RESERVED_MARKERS {
            payload[index] = 0x01;
        }

        let focus = &mut payload[FOCUS_OFFSET..];
        for (block, column) in focus
            .chunks_exact_mut(FOCUS_ROWS)
            .zip(settings.focus_values.columns())
        {
            block.copy_from_slice(column);
        }
        payload
    }

    /// Decodes a settings payload (opcode byte included), merging capability flags from `lens`.
    ///
    /// Focus blocks missing from a short payload are zero-filled.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::SettingsTooShort`] when the payload lacks the FTM and VC bytes.
    #[instrument(skip_all, level = "debug", fields(payload_len = payload.len()))]
    pub fn decode(payload: &[u8], lens: Option<&LensInfo>) -> Result<LensSettings, ParseError> {
        let &[_, ftm, vc_mode, ..] = payload else {
            return Err(ParseError::SettingsTooShort {
                expected: MIN_DECODE_LEN,
                actual: payload.len(),
            });
        };

        if lens.is_none() {
            warn!("no lens info available; capability flags default to disabled");
        }
        let capabilities = lens.map(|lens| lens.capabilities).unwrap_or_default();
        let adj_vc_type = lens.is_some_and(|lens| lens.adj_vc_type);

        let vc_modes = [
            VcModeSlot {
                enabled: capabilities.adj_vc,
            },
            VcModeSlot {
                enabled: capabilities.adj_vc,
            },
            VcModeSlot {
                enabled: capabilities.adj_vc && !adj_vc_type,
            },
        ];

        let vc_mode = if !vc_modes[0].enabled {
            Some(0)
        } else if vc_mode <= MAX_VC_MODE {
            Some(vc_mode)
        } else {
            warn!(vc_mode, "bad VC mode reported by lens");
            None
        };

        let columns: Vec<Vec<u8>> = (0..FOCUS_COLUMNS)
            .map(|column| {
                let start = FOCUS_OFFSET + column * FOCUS_ROWS;
                payload
                    .iter()
                    .skip(start)
                    .take(FOCUS_ROWS)
                    .copied()
                    .collect()
            })
            .collect();

        Ok(LensSettings {
            full_time_manual_focus_override: Setting {
                enabled: capabilities.adj_ftm,
                value: i16::from(ftm) - 1,
            },
            vc_modes,
            vc_mode,
            focus_values: FocusGrid::from_columns(&columns),
        })
    }
}

/// Parses GET_SETTINGS requests and responses.
pub(crate) fn parse_get_settings(
    frame: &[u8],
    _direction: Direction,
    context: &DecodeContext<'_>,
) -> Result<ParsedPayload, ParseError> {
    let payload = payload_of(frame)?;
    let parsed = ParsedPayload::new(Opcode::GetSettings.byte());

    if payload.len() == 1 {
        return Ok(parsed.with_human("Request lens settings"));
    }

    Ok(parsed
        .with_human("Lens Settings")
        .with_details(settings_details(payload, context)?))
}

/// Parses SET_SETTINGS echoes and acknowledgements.
pub(crate) fn parse_set_settings(
    frame: &[u8],
    direction: Direction,
    context: &DecodeContext<'_>,
) -> Result<ParsedPayload, ParseError> {
    let payload = payload_of(frame)?;
    let parsed = ParsedPayload::new(Opcode::SetSettings.byte());

    if let [_, status] = payload {
        if *status == 0x00 {
            return Ok(parsed.with_human("Lens Settings Updated"));
        }
        warn!(status, "bad status for SET_SETTINGS");
        return Ok(parsed);
    }

    let details = settings_details(payload, context)?;
    let parsed = if direction.was_sent() {
        parsed.with_human("Update lens settings")
    } else {
        parsed
    };
    Ok(parsed.with_details(details))
}

/// Decodes a settings payload, keeping a partial record when it is too short.
fn settings_details(
    payload: &[u8],
    context: &DecodeContext<'_>,
) -> Result<PayloadDetails, ParseError> {
    match SettingsCodec::decode(payload, context.lens()) {
        Ok(settings) => Ok(PayloadDetails::Settings(settings)),
        Err(ParseError::SettingsTooShort { expected, actual }) => {
            warn!(expected, actual, "settings payload too short");
            Ok(PayloadDetails::PartialSettings {
                ftm_override: payload.get(1).map(|ftm| i16::from(*ftm) - 1),
                payload_len: actual,
            })
        }
        Err(error) => Err(error),
    }
}
