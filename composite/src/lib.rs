//! Hubble archive RGB composite pipeline.
//!
//! Given an object name, the pipeline locates Hubble observations in the
//! MAST archive, downloads up to three science-image FITS bands, and
//! combines them into a color image: each band is normalized with
//! outlier-robust percentile clipping, then the three are merged with a
//! Lupton asinh stretch.
//!
//! The pipeline is a pure request-response cycle returning structured
//! results; presentation (progress display, PNG export) lives in the
//! `hubble-rgb` binary.

pub mod band;
pub mod demo;
pub mod pipeline;
pub mod render;
pub mod stretch;

pub use band::{load_band, BandError, BandImage, HeaderValue, RetryPolicy};
pub use demo::synthetic_bands;
pub use pipeline::{
    run, run_with, Band, ImageArchive, MastArchive, PipelineConfig, PipelineOutcome,
    PipelineReport, REQUIRED_BANDS,
};
pub use render::CompositeImage;
pub use stretch::{compose, safe_normalize};
