//! Domain entity definitions.

mod bitmap;
mod cache_policy;
mod cached_image;
mod disk_entry;
mod outcome;
mod status;

pub use bitmap::{Bitmap, ImageFrom, ImageInfo, MaxSize, PixelFormat, Resize, ResizeMode};
pub use cache_policy::CachePolicy;
pub use cached_image::{CachedImage, WaitingUse};
pub use disk_entry::DiskEntry;
pub use outcome::{DownloadData, DownloadResult, ImageResult, Outcome, RequestResult};
pub use status::{CancelCause, ErrorCause, RequestKind, RequestLevel, Status};
