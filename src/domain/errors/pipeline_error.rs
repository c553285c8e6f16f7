//! Errors raised by collaborators of the request pipeline.

use thiserror::Error;

/// Download error variants.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DownloadError {
    #[error("request failed: {message}")]
    Request { message: String },

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("failed to read body: {message}")]
    Body { message: String },

    #[error("download canceled")]
    Canceled,
}

impl DownloadError {
    /// Creates a request error.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Creates a body read error.
    #[must_use]
    pub fn body(message: impl Into<String>) -> Self {
        Self::Body {
            message: message.into(),
        }
    }

    /// Returns whether retrying the same request can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Request { .. } | Self::Body { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Canceled => false,
        }
    }
}

/// Decode error variants.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DecodeError {
    #[error("unrecognized image format")]
    UnknownFormat,

    #[error("failed to decode image: {message}")]
    Malformed { message: String },

    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("failed to read image data: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Creates a malformed data error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Image processor error.
#[derive(Debug, Error)]
#[error("processor {processor} failed: {message}")]
pub struct ProcessError {
    /// Key of the failing processor.
    pub processor: String,
    /// Failure description.
    pub message: String,
}

impl ProcessError {
    /// Creates a processor error.
    #[must_use]
    pub fn new(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            message: message.into(),
        }
    }
}
