//! Committed disk cache entries.

use std::path::{Path, PathBuf};

/// A committed entry in the disk cache.
///
/// The handle stays valid only as long as the entry is not evicted; reads after
/// eviction fail with `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    key: String,
    path: PathBuf,
    len: u64,
}

impl DiskEntry {
    /// Creates an entry handle.
    #[must_use]
    pub fn new(key: impl Into<String>, path: PathBuf, len: u64) -> Self {
        Self {
            key: key.into(),
            path,
            len,
        }
    }

    /// Cache key of the entry.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// File holding the bytes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored byte length.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns true for zero-length entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the stored bytes.
    ///
    /// # Errors
    /// Returns error if the entry was evicted or cannot be read.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}
