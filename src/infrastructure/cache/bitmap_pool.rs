//! Pool of reusable pixel buffers.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{Bitmap, PixelFormat};
use crate::domain::ports::BitmapProvider;

/// Default pool budget: 32 MiB.
pub const DEFAULT_BITMAP_POOL_SIZE: usize = 32 * 1024 * 1024;

/// A pooled buffer is only reused for requests needing at least
/// `1 / MAX_SIZE_MULTIPLE` of its allocation.
pub const MAX_SIZE_MULTIPLE: usize = 8;

struct Inner {
    /// Idle buffers in LRU order, keyed by a slot id.
    entries: LruCache<u64, Bitmap>,
    /// Slot ids grouped by format and allocation size.
    buckets: HashMap<PixelFormat, BTreeMap<usize, Vec<u64>>>,
    size: usize,
    next_id: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            buckets: HashMap::new(),
            size: 0,
            next_id: 0,
        }
    }

    fn unlink(&mut self, format: PixelFormat, allocation: usize, id: u64) {
        if let Some(bucket) = self.buckets.get_mut(&format) {
            if let Some(ids) = bucket.get_mut(&allocation) {
                ids.retain(|slot| *slot != id);
                if ids.is_empty() {
                    bucket.remove(&allocation);
                }
            }
            if bucket.is_empty() {
                self.buckets.remove(&format);
            }
        }
    }

    fn take(&mut self, format: PixelFormat, needed: usize) -> Option<Bitmap> {
        let limit = needed.saturating_mul(MAX_SIZE_MULTIPLE);
        let bucket = self.buckets.get_mut(&format)?;
        let allocation = bucket.range(needed..=limit).next().map(|(a, _)| *a)?;
        let id = bucket.get_mut(&allocation)?.last().copied()?;
        self.unlink(format, allocation, id);

        let bitmap = self.entries.pop(&id)?;
        self.size = self.size.saturating_sub(bitmap.allocation_byte_count());
        Some(bitmap)
    }

    fn evict_to(&mut self, target: usize) -> usize {
        let mut evicted = 0;
        while self.size > target {
            let Some((id, bitmap)) = self.entries.pop_lru() else {
                break;
            };
            let allocation = bitmap.allocation_byte_count();
            self.unlink(bitmap.format(), allocation, id);
            self.size = self.size.saturating_sub(allocation);
            evicted += 1;
        }
        evicted
    }
}

/// Pool of idle pixel buffers, reused by decoders to avoid reallocating.
///
/// A buffer is owned either by the pool or by exactly one caller; `get` moves
/// it out and `put` moves it back in.
pub struct BitmapPool {
    inner: Mutex<Inner>,
    max_size: usize,
    disabled: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BitmapPool {
    /// Creates a pool with a byte budget.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            max_size,
            disabled: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns a buffer reshaped to `width` x `height`, if one fits.
    ///
    /// Only buffers of the same format whose allocation is at least the needed
    /// size and at most [`MAX_SIZE_MULTIPLE`] times it are considered.
    pub fn get(&self, width: u32, height: u32, format: PixelFormat) -> Option<Bitmap> {
        if self.is_disabled() {
            return None;
        }
        let needed = format.byte_count(width, height);
        if needed == 0 {
            return None;
        }

        let taken = self.inner.lock().take(format, needed);
        let Some(mut bitmap) = taken else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(width, height, format = format.as_str(), "Bitmap pool miss");
            return None;
        };

        self.hits.fetch_add(1, Ordering::Relaxed);
        if bitmap.reconfigure(width, height, format) {
            trace!(width, height, format = format.as_str(), "Bitmap pool hit");
            Some(bitmap)
        } else {
            None
        }
    }

    /// Returns a buffer to the pool.
    ///
    /// Returns false (and drops the buffer) if the pool is disabled, the buffer
    /// is empty, or it alone exceeds the budget.
    pub fn put(&self, bitmap: Bitmap) -> bool {
        if self.is_disabled() {
            return false;
        }
        let allocation = bitmap.allocation_byte_count();
        if allocation == 0 || allocation > self.max_size {
            trace!(allocation, max_size = self.max_size, "Bitmap rejected by pool");
            return false;
        }

        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id = inner.next_id.wrapping_add(1);
        inner
            .buckets
            .entry(bitmap.format())
            .or_default()
            .entry(allocation)
            .or_default()
            .push(id);
        inner.entries.put(id, bitmap);
        inner.size += allocation;

        let evicted = inner.evict_to(self.max_size);
        if evicted > 0 {
            debug!(evicted, size = inner.size, "Bitmap pool trimmed");
        }
        true
    }

    /// Drops every pooled buffer.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let evicted = inner.evict_to(0);
        debug!(evicted, "Cleared bitmap pool");
    }

    /// Bytes currently pooled.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().size
    }

    /// Byte budget.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of pooled buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if no buffer is pooled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disabling also drops everything pooled.
    pub fn set_disabled(&self, disabled: bool) {
        if self.disabled.swap(disabled, Ordering::AcqRel) != disabled {
            debug!(disabled, "Bitmap pool toggled");
            if disabled {
                self.clear();
            }
        }
    }

    /// Returns true while the pool refuses buffers.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Hit and miss counters.
    #[must_use]
    pub fn hit_counts(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for BitmapPool {
    fn default() -> Self {
        Self::new(DEFAULT_BITMAP_POOL_SIZE)
    }
}

impl std::fmt::Debug for BitmapPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitmapPool")
            .field("max_size", &self.max_size)
            .field("disabled", &self.is_disabled())
            .finish_non_exhaustive()
    }
}

impl BitmapProvider for BitmapPool {
    fn take(&self, width: u32, height: u32, format: PixelFormat) -> Option<Bitmap> {
        self.get(width, height, format)
    }

    fn give_back(&self, bitmap: Bitmap) -> bool {
        self.put(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_reuse() {
        let pool = BitmapPool::new(10_000);
        assert!(pool.put(Bitmap::new(10, 10, PixelFormat::Rgba8888)));
        assert_eq!(pool.size(), 400);

        let bitmap = pool.get(10, 10, PixelFormat::Rgba8888);
        assert!(bitmap.is_some());
        assert_eq!(pool.size(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_larger_capacity_reuse_is_reshaped() {
        let pool = BitmapPool::new(10_000);
        pool.put(Bitmap::new(20, 20, PixelFormat::Rgba8888));

        let bitmap = pool.get(10, 10, PixelFormat::Rgba8888);
        let Some(bitmap) = bitmap else {
            panic!("expected a reused buffer");
        };
        assert_eq!(bitmap.width(), 10);
        assert_eq!(bitmap.pixels().len(), 400);
        assert_eq!(bitmap.allocation_byte_count(), 1600);
    }

    #[test]
    fn test_too_small_or_too_large_not_reused() {
        let pool = BitmapPool::new(100_000);
        pool.put(Bitmap::new(5, 5, PixelFormat::Rgba8888));
        assert!(pool.get(10, 10, PixelFormat::Rgba8888).is_none());

        pool.put(Bitmap::new(100, 100, PixelFormat::Rgba8888));
        assert!(pool.get(2, 2, PixelFormat::Rgba8888).is_none());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_format_must_match() {
        let pool = BitmapPool::new(10_000);
        pool.put(Bitmap::new(10, 10, PixelFormat::Rgba8888));
        assert!(pool.get(10, 10, PixelFormat::Rgb888).is_none());
    }

    #[test]
    fn test_lru_eviction() {
        let pool = BitmapPool::new(800);
        pool.put(Bitmap::new(10, 10, PixelFormat::Rgba8888));
        pool.put(Bitmap::new(10, 10, PixelFormat::L8));
        pool.put(Bitmap::new(10, 10, PixelFormat::Rgba8888));
        pool.put(Bitmap::new(10, 10, PixelFormat::Rgba8888));

        assert!(pool.size() <= 800);
        assert!(pool.get(10, 10, PixelFormat::L8).is_none());
    }

    #[test]
    fn test_oversized_rejected() {
        let pool = BitmapPool::new(100);
        assert!(!pool.put(Bitmap::new(10, 10, PixelFormat::Rgba8888)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_disabled_pool() {
        let pool = BitmapPool::new(10_000);
        pool.put(Bitmap::new(10, 10, PixelFormat::Rgba8888));
        pool.set_disabled(true);
        assert!(pool.is_empty());
        assert!(!pool.put(Bitmap::new(10, 10, PixelFormat::Rgba8888)));
        assert!(pool.get(10, 10, PixelFormat::Rgba8888).is_none());
    }

    #[test]
    fn test_provider_take_or_alloc() {
        let pool = BitmapPool::new(10_000);
        let provider: &dyn BitmapProvider = &pool;
        let fresh = provider.take_or_alloc(3, 3, PixelFormat::L8);
        assert_eq!(fresh.byte_count(), 9);
        assert!(provider.give_back(fresh));
        assert_eq!(pool.len(), 1);
    }
}
