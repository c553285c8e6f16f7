//! Results delivered to request listeners.

use std::sync::Arc;

use bytes::Bytes;

use super::{CachedImage, CancelCause, DiskEntry, ErrorCause, ImageFrom};

/// Downloaded bytes, either committed to the disk cache or held in memory.
#[derive(Debug, Clone)]
pub enum DownloadData {
    /// Bytes live in the disk cache.
    DiskCache(DiskEntry),
    /// Bytes could not be, or were not allowed to be, written to disk.
    Bytes(Bytes),
}

impl DownloadData {
    /// Reads the bytes regardless of where they live.
    ///
    /// # Errors
    /// Returns error if the disk entry vanished or cannot be read.
    pub async fn read(&self) -> std::io::Result<Bytes> {
        match self {
            Self::DiskCache(entry) => entry.read().await.map(Bytes::from),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Result of a download request.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Where the bytes are.
    pub data: DownloadData,
    /// Where they came from.
    pub from: ImageFrom,
}

/// Result of a load or display request.
#[derive(Debug, Clone)]
pub struct ImageResult {
    /// The decoded and processed image.
    pub image: Arc<CachedImage>,
    /// Where it came from.
    pub from: ImageFrom,
}

/// Result of a completed request.
#[derive(Debug, Clone)]
pub enum RequestResult {
    /// A download request finished.
    Download(DownloadResult),
    /// A load request finished.
    Load(ImageResult),
    /// A display request finished.
    Display(ImageResult),
}

impl RequestResult {
    /// Where the result came from.
    #[must_use]
    pub const fn image_from(&self) -> ImageFrom {
        match self {
            Self::Download(result) => result.from,
            Self::Load(result) | Self::Display(result) => result.from,
        }
    }

    /// Decoded image, if the request decoded one.
    #[must_use]
    pub const fn image(&self) -> Option<&Arc<CachedImage>> {
        match self {
            Self::Download(_) => None,
            Self::Load(result) | Self::Display(result) => Some(&result.image),
        }
    }
}

/// Terminal outcome of a request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Finished with a result.
    Completed(RequestResult),
    /// Finished with an error.
    Failed(ErrorCause),
    /// Finished without a result.
    Canceled(CancelCause),
}

impl Outcome {
    /// Returns the result if the request completed.
    #[must_use]
    pub fn into_result(self) -> Option<RequestResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed(_) | Self::Canceled(_) => None,
        }
    }

    /// Returns true if the request completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}
