//! Observation lookup: object name + radius to a bounded list of dataset
//! identifiers.
//!
//! The primary path resolves the name through the archive's own resolver
//! and cone-searches at the result. When that yields nothing, the name is
//! resolved through Sesame and the search repeated. Zero matches is a
//! normal outcome, reported as an empty list.

use std::fmt;

use log::{info, warn};
use serde_json::{Map, Value};

use crate::client::MastClient;
use crate::error::ArchiveError;

/// Upper bound on dataset identifiers handed downstream. Keeps the
/// product-listing fan-out bounded no matter how dense the field is.
pub const MAX_DATASETS: usize = 10;

/// Opaque identifier for one observation in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Self {
        DatasetId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find observations of `object_name` within `radius_deg`.
///
/// Returns at most [`MAX_DATASETS`] identifiers; an empty vector means the
/// archive has nothing for this query (not an error). Transport faults on
/// the primary path propagate; fallback-resolver faults degrade to the
/// empty result with a warning, since by then the name is simply unknown.
pub fn locate(
    client: &MastClient,
    object_name: &str,
    radius_deg: f64,
) -> Result<Vec<DatasetId>, ArchiveError> {
    let mut rows = Vec::new();

    match client.lookup_name(object_name)? {
        Some(position) => rows = client.cone_search(position, radius_deg)?,
        None => info!("archive resolver does not know '{object_name}'"),
    }

    if rows.is_empty() {
        warn!("no observations for '{object_name}' by name; retrying via coordinate resolution");
        match client.resolve_sesame(object_name) {
            Ok(Some(position)) => rows = client.cone_search(position, radius_deg)?,
            Ok(None) => {
                warn!("could not resolve '{object_name}' to coordinates");
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!("coordinate resolution for '{object_name}' failed: {err}");
                return Ok(Vec::new());
            }
        }
    }

    let ids = dataset_ids(&rows);
    info!(
        "found {} observation(s) for '{object_name}' (radius {radius_deg} deg)",
        ids.len()
    );
    Ok(ids)
}

/// Extract the identifier column from cone-search rows, bounded to
/// [`MAX_DATASETS`]. Rows without a usable `obsid` are skipped.
pub fn dataset_ids(rows: &[Map<String, Value>]) -> Vec<DatasetId> {
    rows.iter()
        .filter_map(|row| row.get("obsid"))
        .filter_map(id_string)
        .map(DatasetId::new)
        .take(MAX_DATASETS)
        .collect()
}

/// The archive serves identifiers as either numbers or strings.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
