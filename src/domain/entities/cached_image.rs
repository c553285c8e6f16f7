//! Shared decoded result held by the memory cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{Bitmap, ImageInfo};

/// A decoded result that can be shared between the memory cache and any number
/// of consumers.
///
/// While at least one [`WaitingUse`] guard is alive the memory cache will not
/// evict the entry.
#[derive(Debug)]
pub struct CachedImage {
    key: String,
    bitmap: Bitmap,
    info: ImageInfo,
    waiting_use: AtomicUsize,
    recycled: AtomicBool,
}

impl CachedImage {
    /// Wraps a decoded bitmap.
    #[must_use]
    pub fn new(key: impl Into<String>, bitmap: Bitmap, info: ImageInfo) -> Self {
        Self {
            key: key.into(),
            bitmap,
            info,
            waiting_use: AtomicUsize::new(0),
            recycled: AtomicBool::new(false),
        }
    }

    /// Memory cache key the image was produced for.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Decoded pixels.
    #[must_use]
    pub const fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Source image metadata.
    #[must_use]
    pub const fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Bytes this entry costs the memory cache.
    #[must_use]
    pub fn byte_count(&self) -> usize {
        self.bitmap.allocation_byte_count()
    }

    /// Pins the image until the returned guard is dropped.
    #[must_use]
    pub fn mark_waiting_use(self: &Arc<Self>) -> WaitingUse {
        self.waiting_use.fetch_add(1, Ordering::AcqRel);
        WaitingUse {
            image: Arc::clone(self),
        }
    }

    /// Returns true while any request is waiting to use the image.
    #[must_use]
    pub fn is_waiting_use(&self) -> bool {
        self.waiting_use.load(Ordering::Acquire) > 0
    }

    /// Marks the pixels as no longer valid.
    pub fn recycle(&self) {
        self.recycled.store(true, Ordering::Release);
    }

    /// Returns true once [`CachedImage::recycle`] was called.
    #[must_use]
    pub fn is_recycled(&self) -> bool {
        self.recycled.load(Ordering::Acquire)
    }

    /// Takes the bitmap back, e.g. to return it to the bitmap pool.
    #[must_use]
    pub fn into_bitmap(self) -> Bitmap {
        self.bitmap
    }
}

/// Pin on a [`CachedImage`]; unpins on drop.
#[derive(Debug)]
pub struct WaitingUse {
    image: Arc<CachedImage>,
}

impl WaitingUse {
    /// The pinned image.
    #[must_use]
    pub fn image(&self) -> &Arc<CachedImage> {
        &self.image
    }
}

impl Drop for WaitingUse {
    fn drop(&mut self) {
        self.image.waiting_use.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PixelFormat;

    fn image() -> Arc<CachedImage> {
        Arc::new(CachedImage::new(
            "key",
            Bitmap::new(4, 4, PixelFormat::Rgba8888),
            ImageInfo {
                mime_type: "image/png".to_string(),
                width: 4,
                height: 4,
            },
        ))
    }

    #[test]
    fn test_waiting_use_guard() {
        let image = image();
        assert!(!image.is_waiting_use());

        let first = image.mark_waiting_use();
        let second = image.mark_waiting_use();
        assert!(image.is_waiting_use());

        drop(first);
        assert!(image.is_waiting_use());
        drop(second);
        assert!(!image.is_waiting_use());
    }

    #[test]
    fn test_recycle() {
        let image = image();
        assert!(!image.is_recycled());
        image.recycle();
        assert!(image.is_recycled());
    }
}
