//! Band acquisition: download one FITS product and decode its first
//! usable image extension, with bounded retry.
//!
//! Transient faults (network, torn files) consume attempts; a container
//! that simply holds no 2-D image data is a content fault and fails
//! immediately, since retrying cannot change the bytes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use fitsio::hdu::Hdu;
use fitsio::image::{image_dimensions, read_image_physical};
use fitsio::value::Value;
use log::warn;
use ndarray::Array2;
use thiserror::Error;

use mast::{ArchiveError, DownloadCache, MastClient, ProductRef};

/// Scalar header metadata carried alongside band pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Integer(i64),
    Float(f64),
    Logical(bool),
}

/// One color channel's worth of monochrome image data.
#[derive(Debug, Clone)]
pub struct BandImage {
    /// Pixels in (row, column) order. Blanked pixels arrive as NaN and
    /// are scrubbed by the compositor's normalization.
    pub pixels: Array2<f32>,
    /// Scalar cards from the header of the HDU the data came from.
    pub header: HashMap<String, HeaderValue>,
}

/// Retry configuration for band downloads.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per band, not additional retries: 2 means two
    /// tries and no third.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Band acquisition failures.
#[derive(Debug, Error)]
pub enum BandError {
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("FITS decode error: {0}")]
    Decode(String),

    /// The container holds no extension with non-empty 2-D image data.
    #[error("no extension with 2-D image data")]
    NoImageData,

    /// All attempts consumed; `last` is the final attempt's error.
    #[error("band unavailable after {attempts} attempt(s): {last}")]
    Unavailable { attempts: u32, last: String },
}

/// Download and decode one band, retrying transient faults per `retry`.
pub fn load_band(
    client: &MastClient,
    cache: &DownloadCache,
    product: &ProductRef,
    retry: &RetryPolicy,
) -> Result<BandImage, BandError> {
    load_band_with(retry, || {
        let path = cache.fetch(client, &product.uri)?;
        read_first_image(&path)
    })
}

/// Retry loop shared by [`load_band`] and its tests. `NoImageData`
/// short-circuits; every other failure consumes an attempt.
fn load_band_with<F>(retry: &RetryPolicy, mut attempt_fn: F) -> Result<BandImage, BandError>
where
    F: FnMut() -> Result<BandImage, BandError>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut last = String::new();
    for attempt in 1..=max_attempts {
        match attempt_fn() {
            Ok(band) => return Ok(band),
            Err(BandError::NoImageData) => return Err(BandError::NoImageData),
            Err(err) => {
                warn!("band load attempt {attempt}/{max_attempts} failed: {err}");
                last = err.to_string();
                if attempt < max_attempts {
                    thread::sleep(retry.backoff);
                }
            }
        }
    }
    Err(BandError::Unavailable {
        attempts: max_attempts,
        last,
    })
}

/// Parse a FITS file and return the first HDU holding non-empty image
/// data with at least two axes. Data with more than two axes contributes
/// its first 2-D plane.
pub fn read_first_image(path: &Path) -> Result<BandImage, BandError> {
    let bytes = fs::read(path).map_err(|e| BandError::Decode(e.to_string()))?;
    let parsed = fitsio::hdu::parse_fits(&bytes).map_err(|e| BandError::Decode(format!("{e:?}")))?;

    for hdu in &parsed.hdus {
        // Tables and other non-image HDUs are skipped outright.
        let Ok(dims) = image_dimensions(hdu) else {
            continue;
        };
        if dims.len() < 2 || dims.iter().product::<usize>() == 0 {
            continue;
        }

        let physical =
            read_image_physical(&bytes, hdu).map_err(|e| BandError::Decode(format!("{e:?}")))?;
        // NAXIS1 varies fastest, so dims are (width, height, planes...).
        let (width, height) = (dims[0], dims[1]);
        if physical.len() < width * height {
            continue;
        }
        let plane: Vec<f32> = physical[..width * height]
            .iter()
            .map(|&v| v as f32)
            .collect();
        let pixels = Array2::from_shape_vec((height, width), plane)
            .map_err(|e| BandError::Decode(e.to_string()))?;
        return Ok(BandImage {
            pixels,
            header: header_map(hdu),
        });
    }

    Err(BandError::NoImageData)
}

/// Collect the scalar cards of an HDU header. String-valued and
/// comment-only cards are omitted.
fn header_map(hdu: &Hdu) -> HashMap<String, HeaderValue> {
    let mut header = HashMap::new();
    for card in &hdu.cards {
        let value = match &card.value {
            Some(Value::Integer(n)) => HeaderValue::Integer(*n),
            Some(Value::Float(f)) => HeaderValue::Float(*f),
            Some(Value::Logical(b)) => HeaderValue::Logical(*b),
            _ => continue,
        };
        header.insert(card.keyword_str().to_string(), value);
    }
    header
}
