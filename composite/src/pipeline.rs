//! Pipeline orchestration: locate observations, filter products, load
//! three bands, compose.
//!
//! The pipeline is pure with respect to presentation: it returns a
//! [`PipelineReport`] carrying both the result and the intermediate state
//! a UI may want to show, and emits diagnostics only through the `log`
//! facade. Archive faults are caught here, once for the whole run, and
//! degrade to the matching empty outcome instead of propagating.

use std::fmt;

use log::{error, info, warn};

use mast::{
    filter_products, locate, ArchiveError, DatasetId, DownloadCache, MastClient, ProductRef,
    ProductSelection,
};

use crate::band::{load_band, BandError, BandImage, RetryPolicy};
use crate::render::CompositeImage;
use crate::stretch::compose;

/// Bands required for a composite; fewer aborts before composition.
pub const REQUIRED_BANDS: usize = 3;

/// Color channel assignment for loaded bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Red,
    Green,
    Blue,
}

impl Band {
    /// Load order; the first three product references map onto these.
    pub const ALL: [Band; REQUIRED_BANDS] = [Band::Red, Band::Green, Band::Blue];

    pub fn name(self) -> &'static str {
        match self {
            Band::Red => "red",
            Band::Green => "green",
            Band::Blue => "blue",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub object_name: String,
    /// Search radius in degrees; must be positive.
    pub radius_deg: f64,
    /// Softening scale of the asinh stretch.
    pub stretch: f64,
    /// Nonlinearity factor of the asinh stretch.
    pub q: f64,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            object_name: "M51".to_string(),
            radius_deg: 0.1,
            stretch: 0.5,
            q: 10.0,
            retry: RetryPolicy::default(),
        }
    }
}

/// Access to observations, products, and band data.
///
/// [`MastArchive`] talks to the real services; tests substitute stubs so
/// the orchestration is exercised without a network.
pub trait ImageArchive {
    fn locate(&self, object_name: &str, radius_deg: f64) -> Result<Vec<DatasetId>, ArchiveError>;

    fn products(&self, ids: &[DatasetId]) -> Result<ProductSelection, ArchiveError>;

    fn fetch_band(&self, product: &ProductRef, retry: &RetryPolicy)
        -> Result<BandImage, BandError>;
}

/// The real archive: MAST client plus the shared download cache.
pub struct MastArchive {
    client: MastClient,
    cache: DownloadCache,
}

impl MastArchive {
    pub fn new(client: MastClient, cache: DownloadCache) -> Self {
        Self { client, cache }
    }
}

impl ImageArchive for MastArchive {
    fn locate(&self, object_name: &str, radius_deg: f64) -> Result<Vec<DatasetId>, ArchiveError> {
        locate(&self.client, object_name, radius_deg)
    }

    fn products(&self, ids: &[DatasetId]) -> Result<ProductSelection, ArchiveError> {
        filter_products(&self.client, ids)
    }

    fn fetch_band(
        &self,
        product: &ProductRef,
        retry: &RetryPolicy,
    ) -> Result<BandImage, BandError> {
        load_band(&self.client, &self.cache, product, retry)
    }
}

/// Terminal state of one run.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// All three bands loaded and combined.
    Composite(CompositeImage),
    /// Fewer than [`REQUIRED_BANDS`] bands survived loading.
    InsufficientBands { loaded: usize, required: usize },
    /// The locator found nothing (or the lookup failed and degraded).
    NoObservations,
    /// Observations exist but none offer FITS science images.
    NoProducts,
    /// Bands loaded but could not be combined.
    CompositionFailed,
}

/// Structured result of a run: the outcome plus the intermediate state a
/// presentation layer may want to show.
#[derive(Debug)]
pub struct PipelineReport {
    pub datasets: Vec<DatasetId>,
    pub selection: ProductSelection,
    /// Per-band failure messages for bands that did not load.
    pub band_failures: Vec<(Band, String)>,
    pub outcome: PipelineOutcome,
}

impl PipelineReport {
    fn terminal(
        datasets: Vec<DatasetId>,
        selection: ProductSelection,
        outcome: PipelineOutcome,
    ) -> Self {
        Self {
            datasets,
            selection,
            band_failures: Vec::new(),
            outcome,
        }
    }
}

/// Run the full pipeline.
pub fn run(archive: &impl ImageArchive, config: &PipelineConfig) -> PipelineReport {
    run_with(archive, config, |_, _| {})
}

/// Run the pipeline, reporting each band load's completion (and whether
/// it succeeded) through `progress`.
pub fn run_with(
    archive: &impl ImageArchive,
    config: &PipelineConfig,
    mut progress: impl FnMut(Band, bool),
) -> PipelineReport {
    let datasets = match archive.locate(&config.object_name, config.radius_deg) {
        Ok(ids) => ids,
        Err(err) => {
            warn!(
                "observation lookup for '{}' failed: {err}",
                config.object_name
            );
            Vec::new()
        }
    };
    if datasets.is_empty() {
        return PipelineReport::terminal(
            datasets,
            ProductSelection::default(),
            PipelineOutcome::NoObservations,
        );
    }

    let selection = match archive.products(&datasets) {
        Ok(selection) => selection,
        Err(err) => {
            warn!("product listing failed: {err}");
            ProductSelection::default()
        }
    };
    if selection.is_empty() {
        return PipelineReport::terminal(datasets, selection, PipelineOutcome::NoProducts);
    }
    if selection.refs.len() < REQUIRED_BANDS {
        warn!(
            "only {} FITS product(s) available; {REQUIRED_BANDS} bands required",
            selection.refs.len()
        );
        return PipelineReport::terminal(
            datasets,
            selection,
            PipelineOutcome::InsufficientBands {
                loaded: 0,
                required: REQUIRED_BANDS,
            },
        );
    }

    // Bands are independent; load order carries no meaning beyond the
    // red/green/blue assignment.
    let mut bands: Vec<Option<BandImage>> = Vec::with_capacity(REQUIRED_BANDS);
    let mut band_failures = Vec::new();
    for (band, product) in Band::ALL.into_iter().zip(selection.refs.iter()) {
        match archive.fetch_band(product, &config.retry) {
            Ok(image) => {
                info!("{band} band loaded from {}", product.uri);
                bands.push(Some(image));
                progress(band, true);
            }
            Err(err) => {
                warn!("{band} band failed: {err}");
                band_failures.push((band, err.to_string()));
                bands.push(None);
                progress(band, false);
            }
        }
    }

    let loaded = bands.iter().filter(|b| b.is_some()).count();
    if loaded < REQUIRED_BANDS {
        return PipelineReport {
            datasets,
            selection,
            band_failures,
            outcome: PipelineOutcome::InsufficientBands {
                loaded,
                required: REQUIRED_BANDS,
            },
        };
    }

    let outcome = match compose(
        bands[0].as_ref().map(|b| &b.pixels),
        bands[1].as_ref().map(|b| &b.pixels),
        bands[2].as_ref().map(|b| &b.pixels),
        config.stretch,
        config.q,
    ) {
        Some(pixels) => PipelineOutcome::Composite(CompositeImage { pixels }),
        None => {
            error!("composition failed for '{}'", config.object_name);
            PipelineOutcome::CompositionFailed
        }
    };

    PipelineReport {
        datasets,
        selection,
        band_failures,
        outcome,
    }
}
