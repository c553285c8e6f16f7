//! Domain error types.

mod cache_error;
mod engine_error;
mod pipeline_error;
mod share_error;

pub use cache_error::{CacheError, CacheResult};
pub use engine_error::EngineError;
pub use pipeline_error::{DecodeError, DownloadError, ProcessError};
pub use share_error::ShareError;
