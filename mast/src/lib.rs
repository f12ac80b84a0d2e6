//! MAST archive access
//!
//! This crate provides the archive-facing half of the composite pipeline:
//! resolving an object name to observations, narrowing the observations'
//! data products to science-image FITS files, and downloading products
//! through an idempotent by-URI file cache.
//!
//! All network traffic funnels through [`MastClient`], so transport faults
//! are mapped onto [`ArchiveError`] in exactly one place.

pub mod cache;
pub mod client;
pub mod error;
pub mod locate;
pub mod products;

pub use cache::DownloadCache;
pub use client::{MastClient, SkyPosition};
pub use error::ArchiveError;
pub use locate::{locate, DatasetId, MAX_DATASETS};
pub use products::{
    filter_products, select_products, ProductRef, ProductSelection, ProductType, MAX_PRODUCTS,
    PREFERRED_CALIBRATION,
};
