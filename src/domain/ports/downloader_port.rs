//! Port definition for fetching remote bytes.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::domain::errors::DownloadError;

/// An open response whose body is consumed chunk by chunk.
pub struct DownloadResponse {
    /// Total body length, if the server announced it.
    pub content_length: Option<u64>,
    /// Announced content type.
    pub content_type: Option<String>,
    /// Body chunks.
    pub body: BoxStream<'static, Result<Bytes, DownloadError>>,
}

impl std::fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Port for network downloads.
/// Implementations own connection handling, redirects and timeouts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Opens `uri` and returns the streaming response.
    async fn open(&self, uri: &str) -> Result<DownloadResponse, DownloadError>;
}
