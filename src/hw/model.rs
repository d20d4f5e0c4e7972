use std::fmt;

use bon::Builder;
use serde::Serialize;
use strum_macros::{Display, EnumIter};
use tracing::warn;

use super::catalog::{LensCatalog, LensXmlData};

/// Number of focus-adjustment columns (short, medium, long).
pub const FOCUS_COLUMNS: usize = 3;
/// Number of focal-length rows carried on the wire per column.
pub const FOCUS_ROWS: usize = 8;

/// Lens mount reported by the console.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, Serialize)]
pub enum MountType {
    #[strum(to_string = "E0")]
    Canon,
    #[strum(to_string = "N0")]
    Nikon,
    #[strum(to_string = "S0")]
    Sony,
}

impl MountType {
    /// Maps the console status mount byte.
    ///
    /// ```
    /// use tapin::MountType;
    ///
    /// assert_eq!(Some(MountType::Nikon), MountType::from_status_byte(0x02));
    /// assert_eq!(None, MountType::from_status_byte(0x07));
    /// ```
    #[must_use]
    pub const fn from_status_byte(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Canon),
            0x02 => Some(Self::Nikon),
            0x03 => Some(Self::Sony),
            _ => None,
        }
    }
}

/// Snapshot of the console (adapter) state.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct AdapterInfo {
    pub connected: bool,
    pub lens_attached: Option<bool>,
    pub firmware_version: Option<u16>,
    pub hardware_version: Option<u8>,
    pub connection_version: Option<u16>,
    pub mount_type: Option<MountType>,
}

/// Two-byte firmware/hardware version fields reported by the lens.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct LensVersions {
    pub main0: [u8; 2],
    pub main1: [u8; 2],
    pub sub0: [u8; 2],
    pub sub1: [u8; 2],
    pub hw: [u8; 2],
    pub conn: [u8; 2],
}

/// Adjustment capabilities packed into one lens status byte.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct LensCapabilities {
    pub adj_focus: bool,
    pub adj_ftm: bool,
    pub adj_flimit_sw: bool,
    pub adj_vc: bool,
}

impl LensCapabilities {
    /// Unpacks bit 0 (focus), bit 1 (FTM), bit 2 (limiter switch) and bit 3 (VC).
    ///
    /// ```
    /// use tapin::LensCapabilities;
    ///
    /// let caps = LensCapabilities::from_bits(0x0B);
    /// assert!(caps.adj_focus && caps.adj_ftm && caps.adj_vc);
    /// assert!(!caps.adj_flimit_sw);
    /// ```
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            adj_focus: bits & 0x01 != 0,
            adj_ftm: bits & 0x02 != 0,
            adj_flimit_sw: bits & 0x04 != 0,
            adj_vc: bits & 0x08 != 0,
        }
    }
}

/// Focus-limiter switch metadata.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct FocusLimiter {
    /// Number of limiter positions (2 bits).
    pub count: u8,
    /// Limiter type (2 bits).
    pub kind: u8,
    /// Per-position mode, each `1` or `2`.
    pub modes: [u8; 4],
    pub partition: u8,
    /// Initial positions, stored as `partition - 1 - offset`.
    pub init: [i16; 4],
}

/// Identity and capabilities of the attached lens.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct LensInfo {
    pub conversion_lens_id: u8,
    pub model: String,
    pub serial: String,
    pub versions: LensVersions,
    pub capabilities: LensCapabilities,
    /// When set, the third VC mode slot is unavailable.
    pub adj_vc_type: bool,
    pub focus_focal_lengths: u8,
    pub focus_per_focal_length: u8,
    pub focus_limiter: FocusLimiter,
    pub adj_focus_max: u8,
    pub adj_focus_min: i8,
    pub adj_focus_index: [u16; FOCUS_ROWS],
    pub xml_data: Option<LensXmlData>,
}

/// A lens setting that the lens may or may not allow adjusting.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct Setting<T> {
    pub enabled: bool,
    pub value: T,
}

/// Availability of one vibration-control mode slot.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct VcModeSlot {
    pub enabled: bool,
}

/// Column of the focus-adjustment grid.
#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumIter, Display)]
pub enum FocusColumn {
    Short,
    Medium,
    Long,
}

impl FocusColumn {
    const fn index(self) -> usize {
        match self {
            Self::Short => 0,
            Self::Medium => 1,
            Self::Long => 2,
        }
    }
}

/// Per-focal-length focus calibration bytes, three columns by eight rows.
///
/// Values are the raw wire bytes; use [`crate::focus_byte_to_number`] for the
/// signed view.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct FocusGrid([[u8; FOCUS_ROWS]; FOCUS_COLUMNS]);

impl FocusGrid {
    /// Creates a grid from complete columns.
    #[must_use]
    pub const fn new(columns: [[u8; FOCUS_ROWS]; FOCUS_COLUMNS]) -> Self {
        Self(columns)
    }

    /// Creates a grid from possibly ragged columns, zero-padding missing or short ones.
    ///
    /// ```
    /// use tapin::{FocusColumn, FocusGrid};
    ///
    /// let grid = FocusGrid::from_columns(&[vec![1, 2, 3]]);
    /// assert_eq!(&[1, 2, 3, 0, 0, 0, 0, 0], grid.column(FocusColumn::Short));
    /// assert_eq!(&[0; 8], grid.column(FocusColumn::Long));
    /// ```
    #[must_use]
    pub fn from_columns(columns: &[Vec<u8>]) -> Self {
        let mut grid = [[0_u8; FOCUS_ROWS]; FOCUS_COLUMNS];
        for (index, target) in grid.iter_mut().enumerate() {
            let source = columns.get(index).map(Vec::as_slice).unwrap_or_default();
            if source.len() != FOCUS_ROWS {
                warn!(
                    column = index,
                    len = source.len(),
                    "focus block length is not 8, padding with zeros"
                );
            }
            for (slot, value) in target.iter_mut().zip(source) {
                *slot = *value;
            }
        }
        Self(grid)
    }

    /// Returns all columns.
    #[must_use]
    pub const fn columns(&self) -> &[[u8; FOCUS_ROWS]; FOCUS_COLUMNS] {
        &self.0
    }

    /// Returns one column.
    #[must_use]
    pub const fn column(&self, column: FocusColumn) -> &[u8; FOCUS_ROWS] {
        &self.0[column.index()]
    }

    /// Sets one raw byte; rows past the eighth are ignored.
    pub fn set(&mut self, column: FocusColumn, row: usize, value: u8) {
        if let Some(slot) = self.0[column.index()].get_mut(row) {
            *slot = value;
        }
    }

    /// Returns the first `focal_lengths` rows as `[short, medium, long]` triples.
    ///
    /// ```
    /// use tapin::FocusGrid;
    ///
    /// let grid = FocusGrid::new([[1; 8], [2; 8], [3; 8]]);
    /// assert_eq!(vec![[1, 2, 3]], grid.rows(1).collect::<Vec<_>>());
    /// ```
    pub fn rows(&self, focal_lengths: usize) -> impl Iterator<Item = [u8; FOCUS_COLUMNS]> + '_ {
        (0..focal_lengths.min(FOCUS_ROWS)).map(|row| [self.0[0][row], self.0[1][row], self.0[2][row]])
    }
}

/// Configurable lens state carried by GET/SET_SETTINGS.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct LensSettings {
    /// `-1` off, `0` low, `1` normal, `2` high.
    pub full_time_manual_focus_override: Setting<i16>,
    pub vc_modes: [VcModeSlot; 3],
    /// `None` when the lens reported an out-of-range mode; keep the prior value.
    pub vc_mode: Option<u8>,
    pub focus_values: FocusGrid,
}

/// Device state consulted while decoding status and settings payloads.
#[derive(Clone, Copy, Default, Builder)]
pub struct DecodeContext<'a> {
    lens: Option<&'a LensInfo>,
    adapter: Option<&'a AdapterInfo>,
    catalog: Option<&'a dyn LensCatalog>,
}

impl<'a> DecodeContext<'a> {
    /// Returns the current lens info, if known.
    #[must_use]
    pub fn lens(&self) -> Option<&'a LensInfo> {
        self.lens
    }

    /// Returns the current adapter info, if known.
    #[must_use]
    pub fn adapter(&self) -> Option<&'a AdapterInfo> {
        self.adapter
    }

    /// Looks up vendor metadata for `model` on the adapter's mount.
    pub(crate) fn lens_xml(&self, model: &str) -> Option<LensXmlData> {
        let catalog = self.catalog?;
        let mount = self.adapter?.mount_type?;
        let xml = catalog.lens_xml(model, mount)?;
        match LensXmlData::parse(&xml) {
            Ok(data) => Some(data),
            Err(error) => {
                warn!(%model, %mount, %error, "ignoring unreadable lens metadata");
                None
            }
        }
    }
}

impl fmt::Debug for DecodeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("lens", &self.lens.map(|lens| lens.model.as_str()))
            .field("adapter", &self.adapter)
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0x01, Some(MountType::Canon))]
    #[case(0x02, Some(MountType::Nikon))]
    #[case(0x03, Some(MountType::Sony))]
    #[case(0x00, None)]
    #[case(0x04, None)]
    fn mount_bytes_map_to_closed_set(#[case] byte: u8, #[case] expected: Option<MountType>) {
        assert_eq!(expected, MountType::from_status_byte(byte));
    }

    #[test]
    fn mount_codes_match_catalog_suffixes() {
        assert_eq!("E0", MountType::Canon.to_string());
        assert_eq!("N0", MountType::Nikon.to_string());
        assert_eq!("S0", MountType::Sony.to_string());
    }

    #[test]
    fn capabilities_unpack_each_bit() {
        assert_eq!(
            LensCapabilities {
                adj_focus: false,
                adj_ftm: false,
                adj_flimit_sw: true,
                adj_vc: false,
            },
            LensCapabilities::from_bits(0x04)
        );
    }

    #[test]
    fn from_columns_pads_short_and_truncates_long_blocks() {
        let grid = FocusGrid::from_columns(&[vec![9; 10], vec![], vec![7; 4]]);
        assert_eq!(&[9; 8], grid.column(FocusColumn::Short));
        assert_eq!(&[0; 8], grid.column(FocusColumn::Medium));
        assert_eq!(&[7, 7, 7, 7, 0, 0, 0, 0], grid.column(FocusColumn::Long));
    }

    #[test]
    fn rows_are_capped_at_wire_rows() {
        let grid = FocusGrid::default();
        assert_eq!(8, grid.rows(12).count());
    }

    #[test]
    fn set_ignores_rows_outside_grid() {
        let mut grid = FocusGrid::default();
        grid.set(FocusColumn::Medium, 2, 0xEC);
        grid.set(FocusColumn::Medium, 8, 0x01);
        assert_eq!(&[0, 0, 0xEC, 0, 0, 0, 0, 0], grid.column(FocusColumn::Medium));
    }
}
