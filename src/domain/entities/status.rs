//! Request lifecycle states and terminal causes.

use serde::{Deserialize, Serialize};

/// Position of a request in the dispatch/download/load pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Created, not yet picked up by the dispatch lane.
    #[default]
    WaitDispatch,
    /// Running cheap decisions on the dispatch lane.
    StartDispatch,
    /// Queued on the download pool, or waiting for a shared download.
    WaitDownload,
    /// Running on a download worker.
    StartDownload,
    /// Re-checking the disk cache before touching the network.
    CheckDiskCache,
    /// Opening the connection.
    Connecting,
    /// Streaming the response body.
    ReadData,
    /// Queued on the load pool, or waiting for a shared decode.
    WaitLoad,
    /// Running on a load worker.
    StartLoad,
    /// Re-checking the memory cache before decoding.
    CheckMemoryCache,
    /// Decoding bytes into a bitmap.
    Decoding,
    /// Running image processors.
    Processing,
    /// Result is ready and waiting for delivery.
    WaitDisplay,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
    /// Finished without a result.
    Canceled,
}

impl Status {
    /// Returns true for the three terminal states.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Returns true while download work is queued or running.
    #[must_use]
    pub const fn is_downloading(self) -> bool {
        matches!(
            self,
            Self::WaitDownload
                | Self::StartDownload
                | Self::CheckDiskCache
                | Self::Connecting
                | Self::ReadData
        )
    }

    /// Returns true while load work is queued or running.
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(
            self,
            Self::WaitLoad
                | Self::StartLoad
                | Self::CheckMemoryCache
                | Self::Decoding
                | Self::Processing
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::WaitDispatch => "wait_dispatch",
            Self::StartDispatch => "start_dispatch",
            Self::WaitDownload => "wait_download",
            Self::StartDownload => "start_download",
            Self::CheckDiskCache => "check_disk_cache",
            Self::Connecting => "connecting",
            Self::ReadData => "read_data",
            Self::WaitLoad => "wait_load",
            Self::StartLoad => "start_load",
            Self::CheckMemoryCache => "check_memory_cache",
            Self::Decoding => "decoding",
            Self::Processing => "processing",
            Self::WaitDisplay => "wait_display",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// Why a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCause {
    /// The URI was empty or malformed.
    #[error("invalid uri")]
    UriInvalid,
    /// No URI model understands the URI scheme.
    #[error("unsupported uri")]
    UriNoSupport,
    /// The downloader reported an error.
    #[error("download failed")]
    DownloadError,
    /// The downloaded bytes could not be committed to the disk cache.
    #[error("disk cache write failed")]
    DiskCacheWriteFailed,
    /// The local or cached data source could not be read.
    #[error("data source unavailable")]
    DataSourceUnavailable,
    /// The decoder rejected the data.
    #[error("decode failed")]
    DecodeFailed,
    /// An image processor failed.
    #[error("process failed")]
    ProcessFailed,
    /// The result was recycled before it could be delivered.
    #[error("bitmap recycled before delivery")]
    BitmapRecycled,
}

/// Why a request ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelCause {
    /// Canceled explicitly by the caller.
    Normal,
    /// Superseded by a newer request for the same slot.
    BeReplaced,
    /// Request level forbade network access.
    RequestLevelIsLocal,
    /// Request level forbade anything beyond the memory cache.
    RequestLevelIsMemory,
    /// Downloads are globally paused.
    PauseDownload,
    /// Loads are globally paused.
    PauseLoad,
    /// Dropped from a full worker queue.
    Discarded,
}

impl std::fmt::Display for CancelCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::BeReplaced => "be_replaced",
            Self::RequestLevelIsLocal => "request_level_is_local",
            Self::RequestLevelIsMemory => "request_level_is_memory",
            Self::PauseDownload => "pause_download",
            Self::PauseLoad => "pause_load",
            Self::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// How far a request may go to obtain its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestLevel {
    /// Memory cache only.
    Memory,
    /// Memory cache, disk cache and local sources.
    Local,
    /// Everything including the network.
    #[default]
    Net,
}

impl RequestLevel {
    /// Cancel cause used when the level stops a request.
    #[must_use]
    pub const fn cancel_cause(self) -> CancelCause {
        match self {
            Self::Memory => CancelCause::RequestLevelIsMemory,
            Self::Local | Self::Net => CancelCause::RequestLevelIsLocal,
        }
    }

    /// Short tag used in request keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Local => "local",
            Self::Net => "net",
        }
    }
}

/// The closed set of request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Fetch bytes into the disk cache.
    Download,
    /// Fetch and decode.
    Load,
    /// Fetch, decode and hand over through the memory cache.
    Display,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Download => write!(f, "DownloadRequest"),
            Self::Load => write!(f, "LoadRequest"),
            Self::Display => write!(f, "DisplayRequest"),
        }
    }
}
