//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! services. Nothing in this crate reads process-wide environment variables
//! during request handling, which keeps behaviour consistent across
//! multi-threaded runtimes and test harnesses.

use crate::{StoreError, StoreResult};
use std::path::{Path, PathBuf};

const STATIC_DIR_NAME: &str = "static";

/// Storage configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    storage_root: PathBuf,
}

impl StoreConfig {
    /// Create a new `StoreConfig` rooted at `storage_root`.
    ///
    /// The directory does not need to exist yet; call [`Self::ensure_layout`]
    /// at startup to create it along with the `static/` subtree.
    pub fn new(storage_root: PathBuf) -> Self {
        Self { storage_root }
    }

    /// The top-level directory containing the whole year/country/city tree.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// The `static/` subtree served unconditionally by the HTTP layer.
    ///
    /// The name is non-numeric, so the pin aggregator never mistakes it for
    /// a year directory.
    pub fn static_dir(&self) -> PathBuf {
        self.storage_root.join(STATIC_DIR_NAME)
    }

    /// Create the storage root and its `static/` subtree if missing.
    pub fn ensure_layout(&self) -> StoreResult<()> {
        std::fs::create_dir_all(self.static_dir()).map_err(StoreError::FolderCreation)
    }
}
