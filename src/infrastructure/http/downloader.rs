//! HTTP(S) downloads over reqwest with bounded retries.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::{DownloadError, EngineError};
use crate::domain::ports::{DownloadResponse, Downloader};

const USER_AGENT: &str = concat!("pixload/", env!("CARGO_PKG_VERSION"));

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Extra attempts for connection failures and 5xx responses.
    pub max_retries: u32,
    /// User-Agent header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 1,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Downloads over HTTP(S) and streams the body.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    max_retries: u32,
}

impl HttpDownloader {
    /// Creates a downloader.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: Client, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
        }
    }

    async fn open_once(&self, uri: &str) -> Result<DownloadResponse, DownloadError> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| DownloadError::body(e.to_string())))
            .boxed();

        Ok(DownloadResponse {
            content_length,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn open(&self, uri: &str) -> Result<DownloadResponse, DownloadError> {
        let mut attempt = 0;
        loop {
            match self.open_once(uri).await {
                Ok(response) => {
                    debug!(uri, content_length = ?response.content_length, "Response opened");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(uri, attempt, error = %e, "Retrying download");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn request_error(e: &reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::request("request timed out")
    } else if e.is_connect() {
        DownloadError::request(format!("failed to connect: {e}"))
    } else if e.is_builder() {
        DownloadError::Status {
            status: 0,
            reason: format!("invalid request: {e}"),
        }
    } else {
        DownloadError::request(e.to_string())
    }
}

fn status_error(status: StatusCode) -> DownloadError {
    DownloadError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}
