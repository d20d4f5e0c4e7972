use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::model::{FOCUS_ROWS, LensCapabilities, MountType};

const OPEN_TAG: &str = "<lensinfo";
const CLOSE_TAG: &str = "</lensinfo";
const FIELD_COUNT: usize = 27;

/// Errors returned while reading vendor lens metadata.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CatalogError {
    #[error("document has no <lensinfo> element")]
    MissingLensInfo,
    #[error("lensinfo record has {found} fields, expected at least {expected}")]
    TooFewFields { found: usize, expected: usize },
    #[error("lensinfo field {index} has invalid value `{value}`")]
    InvalidField { index: usize, value: String },
}

/// Vendor-published lens metadata, one CSV record inside a `<lensinfo>` element.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct LensXmlData {
    pub model: String,
    pub lens_type: String,
    pub main_firmware: String,
    pub capabilities: LensCapabilities,
    pub focus_focal_lengths: u8,
    pub focus_per_focal_length: u8,
    pub adj_focus_index: [u16; FOCUS_ROWS],
    pub adj_focus_max: i16,
    pub adj_focus_min: i16,
    pub flimit_sw_num: u8,
    pub flimit_sw_partition: u8,
    pub flimit_sw_init: [i16; 4],
    /// 64 hex characters used to unlock firmware images for this lens.
    pub decrypt_key: String,
}

impl LensXmlData {
    /// Parses a `lensinfo_<model><mount>.xml` document.
    ///
    /// ```
    /// use tapin::LensXmlData;
    ///
    /// let xml = "<LensInfo>F013,A013,SP 45mm,3.1,true,false,true,true,1,3,\
    ///            45,45,45,45,45,45,45,45,30,-30,0,1,1,1,1,1,00FF</LensInfo>";
    /// let data = LensXmlData::parse(xml)?;
    /// assert_eq!("A013", data.model);
    /// assert_eq!(-30, data.adj_focus_min);
    /// # Ok::<(), tapin::CatalogError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the element is missing, has too few fields, or a numeric field
    /// does not parse.
    pub fn parse(document: &str) -> Result<Self, CatalogError> {
        let record = lensinfo_contents(document).ok_or(CatalogError::MissingLensInfo)?;
        let fields: Vec<&str> = record.split(',').map(str::trim).collect();
        if fields.len() < FIELD_COUNT {
            return Err(CatalogError::TooFewFields {
                found: fields.len(),
                expected: FIELD_COUNT,
            });
        }

        let mut adj_focus_index = [0_u16; FOCUS_ROWS];
        for (offset, slot) in adj_focus_index.iter_mut().enumerate() {
            *slot = number(&fields, 10 + offset)?;
        }
        let mut flimit_sw_init = [0_i16; 4];
        for (offset, slot) in flimit_sw_init.iter_mut().enumerate() {
            *slot = number(&fields, 22 + offset)?;
        }

        Ok(Self {
            model: fields[1].to_string(),
            lens_type: fields[2].to_string(),
            main_firmware: fields[3].to_string(),
            capabilities: LensCapabilities {
                adj_focus: flag(fields[4]),
                adj_flimit_sw: flag(fields[5]),
                adj_ftm: flag(fields[6]),
                adj_vc: flag(fields[7]),
            },
            focus_focal_lengths: number(&fields, 8)?,
            focus_per_focal_length: number(&fields, 9)?,
            adj_focus_index,
            adj_focus_max: number(&fields, 18)?,
            adj_focus_min: number(&fields, 19)?,
            flimit_sw_num: number(&fields, 20)?,
            flimit_sw_partition: number(&fields, 21)?,
            flimit_sw_init,
            decrypt_key: fields[26].to_string(),
        })
    }
}

fn lensinfo_contents(document: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with the original text.
    let lowered = document.to_ascii_lowercase();
    let open = lowered.find(OPEN_TAG)?;
    let start = open + lowered[open..].find('>')? + 1;
    let end = start + lowered[start..].find(CLOSE_TAG)?;
    document.get(start..end)
}

fn flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn number<T: FromStr>(fields: &[&str], index: usize) -> Result<T, CatalogError> {
    let value = fields.get(index).copied().unwrap_or_default();
    value
        .parse()
        .map_err(|_invalid| CatalogError::InvalidField {
            index,
            value: value.to_string(),
        })
}

/// Returns the catalog file name for a lens model on a mount.
///
/// ```
/// use tapin::{MountType, catalog_file_name};
///
/// assert_eq!("lensinfo_F013N0.xml", catalog_file_name("F013", MountType::Nikon));
/// ```
#[must_use]
pub fn catalog_file_name(model: &str, mount: MountType) -> String {
    format!("lensinfo_{model}{mount}.xml")
}

/// Source of vendor lens metadata documents, keyed by model and mount.
///
/// Lookups are best-effort: a missing document is not an error.
pub trait LensCatalog {
    /// Returns the raw XML document for `model` on `mount`, if available.
    fn lens_xml(&self, model: &str, mount: MountType) -> Option<String>;
}

/// Catalog backed by a directory of `lensinfo_*.xml` files.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    /// Creates a catalog rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the catalog directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LensCatalog for DirectoryCatalog {
    fn lens_xml(&self, model: &str, mount: MountType) -> Option<String> {
        if model.is_empty() || model.contains(['/', '\\']) || model.contains("..") {
            warn!(%model, "refusing catalog lookup for unsafe model name");
            return None;
        }

        let path = self.root.join(catalog_file_name(model, mount));
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no catalog entry for lens");
                None
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read catalog entry");
                None
            }
        }
    }
}

/// In-memory catalog keyed by [`catalog_file_name`].
impl LensCatalog for HashMap<String, String> {
    fn lens_xml(&self, model: &str, mount: MountType) -> Option<String> {
        self.get(&catalog_file_name(model, mount)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    const F013_N0_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LensInfo version="1">F013,A013,SP 45mm F/1.8 Di VC USD,3.1,true,false,true,true,1,3,45,45,45,45,45,45,45,45,30,-30,0,1,1,1,1,1,035E5241374047595E28645E5C22725243540D554876205341494132595E5D1A</LensInfo>
"#;

    #[test]
    fn parses_vendor_record() {
        let data = LensXmlData::parse(F013_N0_XML).expect("vendor record should parse");
        assert_eq!(
            LensXmlData {
                model: "A013".to_string(),
                lens_type: "SP 45mm F/1.8 Di VC USD".to_string(),
                main_firmware: "3.1".to_string(),
                capabilities: LensCapabilities {
                    adj_focus: true,
                    adj_ftm: true,
                    adj_flimit_sw: false,
                    adj_vc: true,
                },
                focus_focal_lengths: 1,
                focus_per_focal_length: 3,
                adj_focus_index: [45; 8],
                adj_focus_max: 30,
                adj_focus_min: -30,
                flimit_sw_num: 0,
                flimit_sw_partition: 1,
                flimit_sw_init: [1; 4],
                decrypt_key: "035E5241374047595E28645E5C22725243540D554876205341494132595E5D1A"
                    .to_string(),
            },
            data
        );
    }

    #[test]
    fn missing_element_is_reported() {
        assert_eq!(
            Err(CatalogError::MissingLensInfo),
            LensXmlData::parse("<lens>1,2,3</lens>")
        );
    }

    #[test]
    fn short_record_is_reported() {
        assert_eq!(
            Err(CatalogError::TooFewFields {
                found: 3,
                expected: 27,
            }),
            LensXmlData::parse("<lensinfo>1,2,3</lensinfo>")
        );
    }

    #[test]
    fn non_numeric_field_is_reported() {
        let xml = F013_N0_XML.replace(",30,-30,", ",thirty,-30,");
        assert_matches!(
            LensXmlData::parse(&xml),
            Err(CatalogError::InvalidField { index: 18, .. })
        );
    }

    #[test]
    fn map_catalog_is_keyed_by_file_name() {
        let catalog = HashMap::from([(
            "lensinfo_F013N0.xml".to_string(),
            F013_N0_XML.to_string(),
        )]);
        assert!(catalog.lens_xml("F013", MountType::Nikon).is_some());
        assert!(catalog.lens_xml("F013", MountType::Canon).is_none());
    }

    #[test]
    fn directory_catalog_reads_files_and_tolerates_missing_ones() {
        let root = std::env::temp_dir().join(format!("tapin-catalog-{}", std::process::id()));
        std::fs::create_dir_all(&root).expect("temp dir should be creatable");
        std::fs::write(root.join("lensinfo_F013N0.xml"), F013_N0_XML)
            .expect("catalog file should be writable");

        let catalog = DirectoryCatalog::new(&root);
        assert_eq!(
            Some(F013_N0_XML.to_string()),
            catalog.lens_xml("F013", MountType::Nikon)
        );
        assert_eq!(None, catalog.lens_xml("F013", MountType::Sony));
        assert_eq!(None, catalog.lens_xml("../F013", MountType::Nikon));

        std::fs::remove_dir_all(&root).expect("temp dir should be removable");
    }
}
