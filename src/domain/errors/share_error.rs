//! Result sharing error types.

use thiserror::Error;

/// Result sharing error variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ShareError {
    #[error("a leader is already registered for key {key}")]
    LeaderExists { key: String },

    #[error("request {request_id} is not eligible for sharing")]
    NotEligible { request_id: u64 },
}
