//! End-to-end pipeline tests against a stub archive.
//!
//! These exercise the orchestration contract without a network: which
//! stages run, how archive faults degrade, and when composition is (and
//! is not) attempted.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use ndarray::Array2;

use composite::{
    run, Band, BandError, BandImage, ImageArchive, PipelineConfig, PipelineOutcome, RetryPolicy,
};
use mast::{ArchiveError, DatasetId, ProductRef, ProductSelection, ProductType};

fn test_band(height: usize, width: usize) -> BandImage {
    BandImage {
        pixels: Array2::from_shape_fn((height, width), |(y, x)| (y * width + x) as f32),
        header: HashMap::new(),
    }
}

fn flt_ref(n: usize) -> ProductRef {
    ProductRef {
        uri: format!("mast:HST/product/{n}_flt.fits"),
        product_type: ProductType::Image,
        extension: "fits".to_string(),
        calibration_level: Some("FLT".to_string()),
    }
}

fn selection(count: usize) -> ProductSelection {
    ProductSelection {
        refs: (0..count).map(flt_ref).collect(),
        table: Vec::new(),
    }
}

fn ids(count: usize) -> Vec<DatasetId> {
    (0..count).map(|i| DatasetId::new(i.to_string())).collect()
}

/// Scripted archive: fixed locate/products responses, queued band
/// results, and call counters.
struct StubArchive {
    datasets: Result<Vec<DatasetId>, ()>,
    selection: ProductSelection,
    band_results: RefCell<VecDeque<Result<BandImage, BandError>>>,
    products_calls: Cell<usize>,
    fetch_calls: Cell<usize>,
}

impl StubArchive {
    fn new(
        datasets: Result<Vec<DatasetId>, ()>,
        selection: ProductSelection,
        band_results: Vec<Result<BandImage, BandError>>,
    ) -> Self {
        Self {
            datasets,
            selection,
            band_results: RefCell::new(band_results.into()),
            products_calls: Cell::new(0),
            fetch_calls: Cell::new(0),
        }
    }
}

impl ImageArchive for StubArchive {
    fn locate(&self, _object: &str, _radius_deg: f64) -> Result<Vec<DatasetId>, ArchiveError> {
        self.datasets
            .clone()
            .map_err(|_| ArchiveError::Transport("connection refused".to_string()))
    }

    fn products(&self, _ids: &[DatasetId]) -> Result<ProductSelection, ArchiveError> {
        self.products_calls.set(self.products_calls.get() + 1);
        Ok(self.selection.clone())
    }

    fn fetch_band(
        &self,
        _product: &ProductRef,
        _retry: &RetryPolicy,
    ) -> Result<BandImage, BandError> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        self.band_results
            .borrow_mut()
            .pop_front()
            .expect("more band fetches than scripted")
    }
}

fn unavailable() -> BandError {
    BandError::Unavailable {
        attempts: 2,
        last: "timed out".to_string(),
    }
}

#[test]
fn test_three_bands_compose() {
    // 5 observations, 4 FLT products, first three loads succeed.
    let archive = StubArchive::new(
        Ok(ids(5)),
        selection(4),
        vec![
            Ok(test_band(8, 8)),
            Ok(test_band(8, 8)),
            Ok(test_band(8, 8)),
        ],
    );
    let report = run(&archive, &PipelineConfig::default());

    assert_eq!(report.datasets.len(), 5);
    assert!(report.band_failures.is_empty());
    // Only the first three of the four refs are touched.
    assert_eq!(archive.fetch_calls.get(), 3);
    match report.outcome {
        PipelineOutcome::Composite(image) => {
            assert_eq!(image.pixels.dim(), (8, 8, 3));
        }
        other => panic!("expected composite, got {other:?}"),
    }
}

#[test]
fn test_two_bands_do_not_compose() {
    let archive = StubArchive::new(
        Ok(ids(5)),
        selection(4),
        vec![
            Ok(test_band(8, 8)),
            Err(unavailable()),
            Ok(test_band(8, 8)),
        ],
    );
    let report = run(&archive, &PipelineConfig::default());

    match report.outcome {
        PipelineOutcome::InsufficientBands { loaded, required } => {
            assert_eq!(loaded, 2);
            assert_eq!(required, 3);
        }
        other => panic!("expected insufficient bands, got {other:?}"),
    }
    assert_eq!(report.band_failures.len(), 1);
    assert_eq!(report.band_failures[0].0, Band::Green);
    assert!(report.band_failures[0].1.contains("timed out"));
}

#[test]
fn test_locate_failure_degrades_to_no_observations() {
    let archive = StubArchive::new(Err(()), selection(4), Vec::new());
    let report = run(&archive, &PipelineConfig::default());

    assert!(matches!(report.outcome, PipelineOutcome::NoObservations));
    // The failed lookup must stop the run before product listing.
    assert_eq!(archive.products_calls.get(), 0);
    assert_eq!(archive.fetch_calls.get(), 0);
}

#[test]
fn test_zero_observations_skip_product_listing() {
    let archive = StubArchive::new(Ok(Vec::new()), selection(4), Vec::new());
    let report = run(&archive, &PipelineConfig::default());

    assert!(matches!(report.outcome, PipelineOutcome::NoObservations));
    assert_eq!(archive.products_calls.get(), 0);
}

#[test]
fn test_no_products_reported() {
    let archive = StubArchive::new(Ok(ids(3)), ProductSelection::default(), Vec::new());
    let report = run(&archive, &PipelineConfig::default());

    assert!(matches!(report.outcome, PipelineOutcome::NoProducts));
    assert_eq!(archive.fetch_calls.get(), 0);
}

#[test]
fn test_too_few_products_skip_band_loading() {
    let archive = StubArchive::new(Ok(ids(3)), selection(2), Vec::new());
    let report = run(&archive, &PipelineConfig::default());

    match report.outcome {
        PipelineOutcome::InsufficientBands { loaded, required } => {
            assert_eq!(loaded, 0);
            assert_eq!(required, 3);
        }
        other => panic!("expected insufficient bands, got {other:?}"),
    }
    assert_eq!(archive.fetch_calls.get(), 0);
}

#[test]
fn test_mismatched_band_shapes_fail_composition() {
    let archive = StubArchive::new(
        Ok(ids(1)),
        selection(3),
        vec![
            Ok(test_band(8, 8)),
            Ok(test_band(8, 8)),
            Ok(test_band(4, 4)),
        ],
    );
    let report = run(&archive, &PipelineConfig::default());

    assert!(matches!(report.outcome, PipelineOutcome::CompositionFailed));
}

#[test]
fn test_progress_callback_sees_every_band() {
    let archive = StubArchive::new(
        Ok(ids(2)),
        selection(3),
        vec![
            Ok(test_band(4, 4)),
            Err(unavailable()),
            Ok(test_band(4, 4)),
        ],
    );
    let mut seen = Vec::new();
    let _ = composite::run_with(&archive, &PipelineConfig::default(), |band, ok| {
        seen.push((band, ok));
    });
    assert_eq!(
        seen,
        vec![
            (Band::Red, true),
            (Band::Green, false),
            (Band::Blue, true)
        ]
    );
}
