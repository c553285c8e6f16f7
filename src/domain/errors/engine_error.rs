//! Engine construction error types.

use thiserror::Error;

use super::CacheError;

/// Errors raised while building or configuring the engine.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum EngineError {
    #[error("disk cache unavailable: {0}")]
    DiskCache(#[from] CacheError),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("no tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl EngineError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
