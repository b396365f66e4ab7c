//! Storage configuration

use std::path::PathBuf;

/// Default upload limit (2 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 2 * 1024 * 1024;

/// Settings for a [`FileStore`](crate::FileStore)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Flat directory holding every stored file
    pub storage_root: PathBuf,

    /// Largest accepted upload in bytes
    pub max_upload_size: u64,
}

impl StoreConfig {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            ..Self::default()
        }
    }

    pub fn with_max_upload_size(mut self, max_upload_size: u64) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("/tmp"),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}
