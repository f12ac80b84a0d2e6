//! Product filtering: narrow an observation's downloadable products to
//! science-image FITS files.
//!
//! Preference order: FLT-calibrated FITS images, then any FITS image if no
//! FLT products exist. The result is bounded to [`MAX_PRODUCTS`] so three
//! band loads always have a couple of spares.

use log::info;
use serde_json::{Map, Value};

use crate::client::MastClient;
use crate::error::ArchiveError;
use crate::locate::DatasetId;

/// Upper bound on product references handed to the band loader.
pub const MAX_PRODUCTS: usize = 6;

/// Calibration level preferred when selecting science images.
pub const PREFERRED_CALIBRATION: &str = "FLT";

/// Classification of a downloadable data product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductType {
    /// Science image data.
    Image,
    /// Anything else the archive lists (previews, auxiliary files, ...).
    Other(String),
}

impl ProductType {
    /// The archive labels science imagery as either `image` or `SCIENCE`
    /// depending on the mission; both count as [`ProductType::Image`].
    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("image") || raw.eq_ignore_ascii_case("science") {
            ProductType::Image
        } else {
            ProductType::Other(raw.to_string())
        }
    }
}

/// Reference to one downloadable product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRef {
    /// Archive URI used for the download call.
    pub uri: String,
    pub product_type: ProductType,
    /// Lower-cased filename extension derived from the URI.
    pub extension: String,
    /// Calibration tag (e.g. `FLT`) when the archive provides one.
    pub calibration_level: Option<String>,
}

impl ProductRef {
    /// Parse a product row, keeping only the fields the pipeline depends
    /// on. Rows without a URI or product type are unusable and skipped.
    fn from_row(row: &Map<String, Value>) -> Option<Self> {
        let uri = row.get("dataURI")?.as_str()?.to_string();
        let product_type = ProductType::parse(row.get("productType")?.as_str()?);
        let extension = uri
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let calibration_level = row
            .get("productSubGroupDescription")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(ProductRef {
            uri,
            product_type,
            extension,
            calibration_level,
        })
    }

    /// True for FITS science images, the only products the band loader
    /// accepts.
    pub fn is_fits_image(&self) -> bool {
        self.product_type == ProductType::Image && self.extension == "fits"
    }
}

/// Filter output: the bounded reference list plus the metadata rows of the
/// selected products. Only `refs` is consumed by the pipeline; `table` is
/// for display.
#[derive(Debug, Clone, Default)]
pub struct ProductSelection {
    pub refs: Vec<ProductRef>,
    pub table: Vec<Map<String, Value>>,
}

impl ProductSelection {
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// List and filter the products of the given observations.
pub fn filter_products(
    client: &MastClient,
    ids: &[DatasetId],
) -> Result<ProductSelection, ArchiveError> {
    if ids.is_empty() {
        return Ok(ProductSelection::default());
    }
    let rows = client.product_list(ids)?;
    let selection = select_products(&rows);
    info!(
        "selected {} of {} product(s) for download",
        selection.refs.len(),
        rows.len()
    );
    Ok(selection)
}

/// Pure selection rule over product rows: keep FITS images, prefer
/// [`PREFERRED_CALIBRATION`], fall back to any FITS image, and truncate to
/// [`MAX_PRODUCTS`].
pub fn select_products(rows: &[Map<String, Value>]) -> ProductSelection {
    let mut candidates: Vec<(ProductRef, Map<String, Value>)> = rows
        .iter()
        .filter_map(|row| ProductRef::from_row(row).map(|r| (r, row.clone())))
        .filter(|(r, _)| r.is_fits_image())
        .collect();

    let has_preferred = candidates
        .iter()
        .any(|(r, _)| r.calibration_level.as_deref() == Some(PREFERRED_CALIBRATION));
    if has_preferred {
        candidates.retain(|(r, _)| r.calibration_level.as_deref() == Some(PREFERRED_CALIBRATION));
    }
    candidates.truncate(MAX_PRODUCTS);

    let (refs, table) = candidates.into_iter().unzip();
    ProductSelection { refs, table }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_row(uri: &str, product_type: &str, subgroup: Option<&str>) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("dataURI".to_string(), json!(uri));
        map.insert("productType".to_string(), json!(product_type));
        if let Some(sub) = subgroup {
            map.insert("productSubGroupDescription".to_string(), json!(sub));
        }
        map
    }

    #[test]
    fn test_prefers_flt_calibration() {
        let rows = vec![
            product_row("mast:HST/product/a_raw.fits", "SCIENCE", Some("RAW")),
            product_row("mast:HST/product/b_flt.fits", "SCIENCE", Some("FLT")),
            product_row("mast:HST/product/c_flt.fits", "SCIENCE", Some("FLT")),
        ];
        let selection = select_products(&rows);
        assert_eq!(selection.refs.len(), 2);
        assert!(selection
            .refs
            .iter()
            .all(|r| r.calibration_level.as_deref() == Some("FLT")));
    }

    #[test]
    fn test_falls_back_to_any_fits_image() {
        let rows = vec![
            product_row("mast:HST/product/a_drz.fits", "SCIENCE", Some("DRZ")),
            product_row("mast:HST/product/b_raw.fits", "image", None),
        ];
        let selection = select_products(&rows);
        assert_eq!(selection.refs.len(), 2);
    }

    #[test]
    fn test_excludes_non_fits_and_non_images() {
        let rows = vec![
            product_row("mast:HST/product/a_preview.jpg", "PREVIEW", None),
            product_row("mast:HST/product/b_spt.fits", "AUXILIARY", None),
            product_row("mast:HST/product/c_flt.fits", "SCIENCE", Some("FLT")),
        ];
        let selection = select_products(&rows);
        assert_eq!(selection.refs.len(), 1);
        assert_eq!(selection.refs[0].uri, "mast:HST/product/c_flt.fits");
        assert!(selection.refs[0].is_fits_image());
    }

    #[test]
    fn test_truncates_to_max_products() {
        let rows: Vec<_> = (0..10)
            .map(|i| {
                product_row(
                    &format!("mast:HST/product/{i}_flt.fits"),
                    "SCIENCE",
                    Some("FLT"),
                )
            })
            .collect();
        let selection = select_products(&rows);
        assert_eq!(selection.refs.len(), MAX_PRODUCTS);
        assert_eq!(selection.table.len(), MAX_PRODUCTS);
    }

    #[test]
    fn test_skips_rows_missing_fields() {
        let mut incomplete = Map::new();
        incomplete.insert("productType".to_string(), json!("SCIENCE"));
        let rows = vec![
            incomplete,
            product_row("mast:HST/product/ok_flt.fits", "SCIENCE", Some("FLT")),
        ];
        let selection = select_products(&rows);
        assert_eq!(selection.refs.len(), 1);
    }

    #[test]
    fn test_empty_rows_give_empty_selection() {
        let selection = select_products(&[]);
        assert!(selection.is_empty());
        assert!(selection.table.is_empty());
    }
}
