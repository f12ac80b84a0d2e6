//! HTTP client for the MAST invoke API and the Sesame name resolver.
//!
//! Every archive interaction goes through [`MastClient`], which owns the
//! agent (and its global timeout) and maps transport faults onto
//! [`ArchiveError`]. Higher layers never see `ureq` types.

use std::io;
use std::path::Path;
use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::ArchiveError;
use crate::locate::DatasetId;

/// Default MAST API root.
pub const MAST_BASE_URL: &str = "https://mast.stsci.edu";

/// Default CDS Sesame name resolver root.
pub const SESAME_BASE_URL: &str = "https://cds.unistra.fr/cgi-bin/nph-sesame";

/// Bound on a single query or download attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A position on the sky in decimal degrees (ICRS).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

/// Envelope shared by the tabular MAST invoke services.
///
/// Rows stay as opaque JSON maps; the callers extract only the columns
/// they depend on (`obsid`, `dataURI`, ...).
#[derive(Debug, Deserialize)]
struct MastEnvelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

/// Response shape of the `Mast.Name.Lookup` service, which does not use
/// the tabular envelope.
#[derive(Debug, Deserialize)]
struct NameLookupResponse {
    #[serde(rename = "resolvedCoordinate", default)]
    resolved: Vec<ResolvedCoordinate>,
}

#[derive(Debug, Deserialize)]
struct ResolvedCoordinate {
    ra: f64,
    decl: f64,
}

/// Sesame plain-text responses carry the position on a `%J ra dec` line.
static SESAME_POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^%J\s+([-+0-9.eE]+)\s+([-+0-9.eE]+)").unwrap());

/// Client for the archive services used by the pipeline.
pub struct MastClient {
    agent: ureq::Agent,
    base_url: String,
    sesame_url: String,
}

impl MastClient {
    /// Client against the public MAST and Sesame endpoints.
    pub fn new() -> Self {
        Self::with_urls(MAST_BASE_URL, SESAME_BASE_URL)
    }

    /// Client against explicit service roots (used by tests and mirrors).
    pub fn with_urls(base_url: &str, sesame_url: &str) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .new_agent();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            sesame_url: sesame_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The one collaborator-call entry point: GET a URL and decode JSON.
    /// All transport and decode faults map onto [`ArchiveError`] here.
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ArchiveError> {
        debug!("GET {url}");
        let mut response = self.agent.get(url).call()?;
        serde_json::from_reader(response.body_mut().as_reader())
            .map_err(|e| ArchiveError::Parse(e.to_string()))
    }

    /// URL for a MAST invoke request with the given JSON payload.
    fn invoke_url(&self, request: &Value) -> String {
        format!(
            "{}/api/v0/invoke?request={}",
            self.base_url,
            urlencoding::encode(&request.to_string())
        )
    }

    /// Call a tabular invoke service and return its data rows.
    fn invoke(&self, service: &str, params: Value) -> Result<Vec<Map<String, Value>>, ArchiveError> {
        let request = json!({
            "service": service,
            "params": params,
            "format": "json",
            "pagesize": 5000,
            "page": 1,
        });
        let envelope: MastEnvelope = self.get_json(&self.invoke_url(&request))?;
        if !envelope.status.is_empty() && envelope.status != "COMPLETE" {
            return Err(ArchiveError::Service(format!(
                "{service} returned {}: {}",
                envelope.status, envelope.msg
            )));
        }
        Ok(envelope.data)
    }

    /// Resolve an object name through the archive's own resolver.
    ///
    /// `Ok(None)` means the archive does not know the name; transport
    /// faults stay errors.
    pub fn lookup_name(&self, name: &str) -> Result<Option<SkyPosition>, ArchiveError> {
        let request = json!({
            "service": "Mast.Name.Lookup",
            "params": { "input": name, "format": "json" },
        });
        let response: NameLookupResponse = self.get_json(&self.invoke_url(&request))?;
        Ok(response.resolved.first().map(|c| SkyPosition {
            ra_deg: c.ra,
            dec_deg: c.decl,
        }))
    }

    /// Resolve an object name through the CDS Sesame service.
    pub fn resolve_sesame(&self, name: &str) -> Result<Option<SkyPosition>, ArchiveError> {
        let url = format!("{}/-oI/A?{}", self.sesame_url, urlencoding::encode(name));
        debug!("GET {url}");
        let mut response = self.agent.get(&url).call()?;
        let text = response.body_mut().read_to_string()?;
        Ok(parse_sesame(&text))
    }

    /// Cone search for observations around a position.
    pub fn cone_search(
        &self,
        position: SkyPosition,
        radius_deg: f64,
    ) -> Result<Vec<Map<String, Value>>, ArchiveError> {
        self.invoke(
            "Mast.Caom.Cone",
            json!({
                "ra": position.ra_deg,
                "dec": position.dec_deg,
                "radius": radius_deg,
            }),
        )
    }

    /// List the downloadable products of the given observations.
    pub fn product_list(&self, ids: &[DatasetId]) -> Result<Vec<Map<String, Value>>, ArchiveError> {
        let joined = ids
            .iter()
            .map(DatasetId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.invoke("Mast.Caom.Products", json!({ "obsid": joined }))
    }

    /// Stream a product download to `dest`.
    pub fn download_to(&self, uri: &str, dest: &Path) -> Result<(), ArchiveError> {
        let url = format!(
            "{}/api/v0.1/Download/file?uri={}",
            self.base_url,
            urlencoding::encode(uri)
        );
        debug!("GET {url}");
        let mut response = self.agent.get(&url).call()?;
        let mut file = std::fs::File::create(dest)?;
        io::copy(&mut response.body_mut().as_reader(), &mut file)?;
        Ok(())
    }
}

impl Default for MastClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the first `%J ra dec` position from a Sesame response.
fn parse_sesame(text: &str) -> Option<SkyPosition> {
    let caps = SESAME_POSITION.captures(text)?;
    let ra_deg = caps[1].parse().ok()?;
    let dec_deg = caps[2].parse().ok()?;
    Some(SkyPosition { ra_deg, dec_deg })
}
