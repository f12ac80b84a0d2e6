//! File-based cache of downloaded products, keyed by URI.
//!
//! Archive URIs name immutable content, so a present entry is reused
//! without revalidation and concurrent writes of the same entry are
//! harmless (same URI, same bytes). Downloads land in a `.part` file and
//! are renamed into place so a torn download never looks like a hit.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::client::MastClient;
use crate::error::ArchiveError;

pub struct DownloadCache {
    dir: PathBuf,
}

impl DownloadCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Default cache location under the system temp directory.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("mast-product-cache")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file path for a product URI: md5 of the URI plus its
    /// basename, so entries stay unique but recognizable on disk.
    pub fn entry_path(&self, uri: &str) -> PathBuf {
        let digest = md5::compute(uri.as_bytes());
        let basename = uri.rsplit('/').next().unwrap_or("product");
        self.dir.join(format!("{digest:x}_{basename}"))
    }

    /// Fetch a product, reusing the cached copy when present.
    pub fn fetch(&self, client: &MastClient, uri: &str) -> Result<PathBuf, ArchiveError> {
        let path = self.entry_path(uri);
        if path.exists() {
            debug!("cache hit for {uri}");
            return Ok(path);
        }

        info!("downloading {uri}");
        let partial = path.with_extension("part");
        client.download_to(uri, &partial)?;
        fs::rename(&partial, &path)?;
        Ok(path)
    }
}
