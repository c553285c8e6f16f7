//! In-memory LRU cache of decoded images, bounded by byte size.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::CachedImage;
use crate::domain::ports::BitmapProvider;

/// Default memory budget: 64 MiB of decoded pixels.
pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 64 * 1024 * 1024;

struct Inner {
    entries: LruCache<String, Arc<CachedImage>>,
    size: usize,
}

impl Inner {
    fn pop(&mut self, key: &str) -> Option<Arc<CachedImage>> {
        let image = self.entries.pop(key)?;
        self.size = self.size.saturating_sub(image.byte_count());
        Some(image)
    }

    /// Evicts least-recently-used entries that are not pinned until the
    /// total fits into `target`.
    fn trim_to(&mut self, target: usize) -> Vec<Arc<CachedImage>> {
        let mut evicted = Vec::new();
        while self.size > target {
            let victim = self
                .entries
                .iter()
                .rev()
                .find(|(_, image)| !image.is_waiting_use())
                .map(|(key, _)| key.clone());

            let Some(key) = victim else {
                debug!(
                    size = self.size,
                    target_size = target,
                    "Memory cache over budget but every entry is pinned"
                );
                break;
            };

            if let Some(image) = self.pop(&key) {
                trace!(key = %key, bytes = image.byte_count(), "Evicted from memory cache");
                evicted.push(image);
            }
        }
        evicted
    }
}

/// LRU cache of decoded images keyed by memory cache key.
///
/// Eviction is by cumulative allocation size and skips entries that a live
/// request pinned with [`CachedImage::mark_waiting_use`].
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size: usize,
    disabled: AtomicBool,
    pool: Option<Arc<dyn BitmapProvider>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Creates a cache with a byte budget.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                size: 0,
            }),
            max_size,
            disabled: AtomicBool::new(false),
            pool: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Evicted images that nobody else holds give their buffers to `pool`.
    #[must_use]
    pub fn with_bitmap_pool(mut self, pool: Arc<dyn BitmapProvider>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Looks up an image and marks it most recently used.
    ///
    /// Recycled images are removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Arc<CachedImage>> {
        if self.is_disabled() {
            return None;
        }

        let mut inner = self.inner.lock();
        let recycled = match inner.entries.get(key) {
            Some(image) if !image.is_recycled() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Memory cache hit");
                return Some(Arc::clone(image));
            }
            Some(_) => true,
            None => false,
        };

        if recycled {
            inner.pop(key);
            debug!(key = %key, "Dropped recycled image from memory cache");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, "Memory cache miss");
        None
    }

    /// Looks up an image without touching the LRU order.
    pub fn peek(&self, key: &str) -> Option<Arc<CachedImage>> {
        if self.is_disabled() {
            return None;
        }
        let inner = self.inner.lock();
        inner
            .entries
            .peek(key)
            .filter(|image| !image.is_recycled())
            .cloned()
    }

    /// Stores an image, evicting older unpinned entries as needed.
    ///
    /// Returns false if the cache is disabled or the image alone exceeds the
    /// budget.
    pub fn put(&self, key: impl Into<String>, image: Arc<CachedImage>) -> bool {
        if self.is_disabled() {
            return false;
        }
        let key = key.into();
        let bytes = image.byte_count();
        if bytes > self.max_size {
            debug!(key = %key, bytes, max_size = self.max_size, "Image too large for memory cache");
            return false;
        }

        let evicted = {
            let mut inner = self.inner.lock();
            if let Some(old) = inner.entries.put(key.clone(), image) {
                inner.size = inner.size.saturating_sub(old.byte_count());
            }
            inner.size += bytes;
            debug!(key = %key, bytes, size = inner.size, "Stored image in memory cache");
            inner.trim_to(self.max_size)
        };
        self.release(evicted);
        true
    }

    /// Removes an entry regardless of pins.
    pub fn remove(&self, key: &str) -> Option<Arc<CachedImage>> {
        let removed = self.inner.lock().pop(key);
        if removed.is_some() {
            debug!(key = %key, "Removed image from memory cache");
        }
        removed
    }

    /// Drops every entry that is not pinned.
    pub fn clear(&self) {
        let evicted = self.inner.lock().trim_to(0);
        debug!(count = evicted.len(), "Cleared memory cache");
        self.release(evicted);
    }

    /// Evicts unpinned entries until at most `fraction` of the budget is used.
    pub fn trim(&self, fraction: f32) {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let target = (self.max_size as f32 * fraction.clamp(0.0, 1.0)) as usize;
        let evicted = self.inner.lock().trim_to(target);
        self.release(evicted);
    }

    /// Bytes currently held.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().size
    }

    /// Byte budget.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turns the cache into a pass-through.
    pub fn set_disabled(&self, disabled: bool) {
        if self.disabled.swap(disabled, Ordering::AcqRel) != disabled {
            debug!(disabled, "Memory cache toggled");
        }
    }

    /// Returns true while the cache is a pass-through.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let inner = self.inner.lock();
        CacheStats {
            hits,
            misses,
            hit_rate,
            entries: inner.entries.len(),
            size: inner.size,
            max_size: self.max_size,
        }
    }

    fn release(&self, evicted: Vec<Arc<CachedImage>>) {
        let Some(pool) = &self.pool else {
            return;
        };
        for image in evicted {
            if let Ok(image) = Arc::try_unwrap(image) {
                pool.give_back(image.into_bitmap());
            }
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_SIZE)
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("max_size", &self.max_size)
            .field("disabled", &self.is_disabled())
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub entries: usize,
    /// Bytes currently held.
    pub size: usize,
    /// Byte budget.
    pub max_size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images, {}/{} bytes, {:.1}% hit rate ({} hits, {} misses)",
            self.entries, self.size, self.max_size, self.hit_rate, self.hits, self.misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Bitmap, ImageInfo, PixelFormat};
    use crate::infrastructure::cache::BitmapPool;

    /// 10x10 RGBA, 400 bytes.
    fn image(key: &str) -> Arc<CachedImage> {
        Arc::new(CachedImage::new(
            key,
            Bitmap::new(10, 10, PixelFormat::Rgba8888),
            ImageInfo {
                mime_type: "image/png".to_string(),
                width: 10,
                height: 10,
            },
        ))
    }

    #[test]
    fn test_cache_put_and_get() {
        let cache = MemoryCache::new(10_000);
        cache.put("a", image("a"));

        let retrieved = cache.get("a");
        assert!(retrieved.is_some());
        assert_eq!(retrieved.map(|i| i.bitmap().width()), Some(10));
        assert_eq!(cache.size(), 400);
    }

    #[test]
    fn test_cache_miss() {
        let cache = MemoryCache::new(10_000);
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_eviction_follows_access_order() {
        let cache = MemoryCache::new(800);
        cache.put("a", image("a"));
        cache.put("b", image("b"));

        // Touch "a" so "b" becomes the least recently used.
        assert!(cache.get("a").is_some());
        cache.put("c", image("c"));

        assert!(cache.peek("b").is_none());
        assert!(cache.peek("a").is_some());
        assert!(cache.peek("c").is_some());
        assert_eq!(cache.size(), 800);
    }

    #[test]
    fn test_eviction_prefers_least_recently_accessed() {
        let cache = MemoryCache::new(800);
        cache.put("a", image("a"));
        cache.put("b", image("b"));
        assert!(cache.get("b").is_some());
        cache.put("c", image("c"));

        assert!(cache.peek("a").is_none());
        assert!(cache.peek("b").is_some());
    }

    #[test]
    fn test_pinned_entry_survives_pressure() {
        let cache = MemoryCache::new(800);
        let pinned = image("pinned");
        cache.put("pinned", Arc::clone(&pinned));
        let guard = pinned.mark_waiting_use();

        for i in 0..20 {
            let key = format!("filler-{i}");
            cache.put(key.clone(), image(&key));
        }

        assert!(cache.get("pinned").is_some());
        assert!(cache.size() <= 800);

        drop(guard);
        cache.put("last-1", image("last-1"));
        cache.put("last-2", image("last-2"));
        assert!(cache.peek("pinned").is_none());
    }

    #[test]
    fn test_all_pinned_exceeds_budget() {
        let cache = MemoryCache::new(400);
        let a = image("a");
        let b = image("b");
        let _ga = a.mark_waiting_use();
        let _gb = b.mark_waiting_use();
        cache.put("a", a);
        cache.put("b", b);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.size(), 800);
    }

    #[test]
    fn test_recycled_is_a_miss() {
        let cache = MemoryCache::new(10_000);
        let img = image("a");
        cache.put("a", Arc::clone(&img));
        img.recycle();

        assert!(cache.get("a").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_replace_keeps_accounting() {
        let cache = MemoryCache::new(10_000);
        cache.put("a", image("a"));
        cache.put("a", image("a"));
        assert_eq!(cache.size(), 400);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_too_large_rejected() {
        let cache = MemoryCache::new(100);
        assert!(!cache.put("a", image("a")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_is_pass_through() {
        let cache = MemoryCache::new(10_000);
        cache.set_disabled(true);
        assert!(!cache.put("a", image("a")));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_clear_keeps_pinned() {
        let cache = MemoryCache::new(10_000);
        let pinned = image("pinned");
        let _guard = pinned.mark_waiting_use();
        cache.put("pinned", pinned);
        cache.put("b", image("b"));

        cache.clear();
        assert_eq!(cache.len(), 1);
        assert!(cache.peek("pinned").is_some());
    }

    #[test]
    fn test_evicted_buffers_return_to_pool() {
        let pool = Arc::new(BitmapPool::new(10_000));
        let cache = MemoryCache::new(400).with_bitmap_pool(pool.clone());
        cache.put("a", image("a"));
        cache.put("b", image("b"));

        assert_eq!(pool.size(), 400);
        assert!(pool.get(10, 10, PixelFormat::Rgba8888).is_some());
    }

    #[test]
    fn test_cache_stats() {
        let cache = MemoryCache::new(10_000);
        cache.put("a", image("a"));
        let _ = cache.get("a");
        let _ = cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}
