use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// First byte of every frame.
pub const PREAMBLE: u8 = 0x0F;
/// Last byte of every frame.
pub const POSTAMBLE: u8 = 0xF0;

/// Known TAP-in command opcodes (first payload byte).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, Serialize)]
pub enum Opcode {
    #[strum(to_string = "IS_LENS_ATTACHED")]
    IsLensAttached,
    #[strum(to_string = "POWER_ON")]
    PowerOn,
    #[strum(to_string = "POWER_OFF")]
    PowerOff,
    #[strum(to_string = "GET_STATUS")]
    GetStatus,
    #[strum(to_string = "SET_SETTINGS")]
    SetSettings,
    #[strum(to_string = "GET_SETTINGS")]
    GetSettings,
    #[strum(to_string = "UPDATE_FIRMWARE")]
    UpdateFirmware,
    #[strum(to_string = "ERROR")]
    Error,
}

impl Opcode {
    /// Returns the wire byte for this opcode.
    ///
    /// ```
    /// use tapin::Opcode;
    ///
    /// assert_eq!(0xF8, Opcode::PowerOn.byte());
    /// ```
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Self::IsLensAttached => 0xF7,
            Self::PowerOn => 0xF8,
            Self::PowerOff => 0xF9,
            Self::GetStatus => 0xFA,
            Self::SetSettings => 0xFB,
            Self::GetSettings => 0xFC,
            Self::UpdateFirmware => 0xFD,
            Self::Error => 0xFF,
        }
    }

    /// Looks up the opcode for a wire byte.
    ///
    /// ```
    /// use tapin::Opcode;
    ///
    /// assert_eq!(Some(Opcode::GetStatus), Opcode::from_byte(0xFA));
    /// assert_eq!(None, Opcode::from_byte(0xFE));
    /// ```
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        OPCODES_BY_BYTE.get(&value).copied()
    }
}

/// Opcodes keyed by their wire byte.
static OPCODES_BY_BYTE: LazyLock<HashMap<u8, Opcode>> =
    LazyLock::new(|| Opcode::iter().map(|opcode| (opcode.byte(), opcode)).collect());

/// Protocol destination carried in header bytes `2..4`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub enum Destination {
    /// The attached lens.
    Lens,
    /// The TAP-in console itself.
    Console,
    /// Any other destination id.
    Unknown(u16),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lens => f.write_str("Lens"),
            Self::Console => f.write_str("Console"),
            Self::Unknown(id) => write!(f, "Unknown(0x{id:04X})"),
        }
    }
}

impl Destination {
    /// Returns the 16-bit destination id.
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Lens => 0x0000,
            Self::Console => 0x0001,
            Self::Unknown(id) => id,
        }
    }
}

impl From<u16> for Destination {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Self::Lens,
            0x0001 => Self::Console,
            other => Self::Unknown(other),
        }
    }
}

/// Returns the opcode byte of a payload, if any.
pub(crate) fn opcode_from_payload(payload: &[u8]) -> Option<u8> {
    payload.first().copied()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0xF7, Opcode::IsLensAttached)]
    #[case(0xF8, Opcode::PowerOn)]
    #[case(0xF9, Opcode::PowerOff)]
    #[case(0xFA, Opcode::GetStatus)]
    #[case(0xFB, Opcode::SetSettings)]
    #[case(0xFC, Opcode::GetSettings)]
    #[case(0xFD, Opcode::UpdateFirmware)]
    #[case(0xFF, Opcode::Error)]
    fn opcode_bytes_round_trip(#[case] byte: u8, #[case] opcode: Opcode) {
        assert_eq!(byte, opcode.byte());
        assert_eq!(Some(opcode), Opcode::from_byte(byte));
    }

    #[test]
    fn gap_byte_is_not_an_opcode() {
        assert_eq!(None, Opcode::from_byte(0xFE));
    }

    #[test]
    fn opcode_names_match_protocol_labels() {
        assert_eq!("SET_SETTINGS", Opcode::SetSettings.to_string());
        assert_eq!("IS_LENS_ATTACHED", Opcode::IsLensAttached.to_string());
    }

    #[test]
    fn destinations_map_from_ids() {
        assert_eq!(Destination::Lens, Destination::from(0x0000));
        assert_eq!(Destination::Console, Destination::from(0x0001));
        assert_eq!(Destination::Unknown(0x0102), Destination::from(0x0102));
        assert_eq!(0x0102, Destination::Unknown(0x0102).id());
    }
}
