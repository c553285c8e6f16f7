//! Cache error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache is disabled")]
    Disabled,

    #[error("corrupt journal line {line}: {reason}")]
    CorruptJournal { line: usize, reason: String },

    #[error("entry too large for cache: {size} bytes (max {max_size})")]
    TooLarge { size: u64, max_size: u64 },

    #[error("failed to persist cache entry: {0}")]
    Persist(#[from] tempfile::PathPersistError),
}

impl CacheError {
    /// Creates a corrupt journal error.
    #[must_use]
    pub fn corrupt_journal(line: usize, reason: impl Into<String>) -> Self {
        Self::CorruptJournal {
            line,
            reason: reason.into(),
        }
    }

    /// Returns whether the error left the cache contents untouched.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::Disabled | Self::TooLarge { .. })
    }
}
