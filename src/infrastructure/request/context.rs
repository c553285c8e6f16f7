//! Services shared by every request of one engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::runtime::Handle;
use tracing::debug;

use crate::domain::ports::{BitmapProvider, Decoder, Downloader};
use crate::infrastructure::cache::{BitmapPool, DiskCache, MemoryCache};
use crate::infrastructure::executor::{CallbackDispatcher, ExecutorConfig, RequestExecutor};
use crate::infrastructure::share::ResultShareManager;
use crate::infrastructure::uri::UriModelRegistry;

use super::Request;

/// Collaborators an engine is assembled from.
pub struct EngineComponents {
    /// Decoded image cache.
    pub memory_cache: MemoryCache,
    /// Reusable pixel buffers.
    pub bitmap_pool: Arc<BitmapPool>,
    /// Downloaded byte cache.
    pub disk_cache: Arc<DiskCache>,
    /// Network access.
    pub downloader: Arc<dyn Downloader>,
    /// Bytes to bitmap.
    pub decoder: Arc<dyn Decoder>,
    /// URI scheme strategies.
    pub uri_models: UriModelRegistry,
}

/// Everything a request needs while it runs.
pub struct EngineContext {
    pub(crate) executor: RequestExecutor,
    pub(crate) callbacks: CallbackDispatcher,
    pub(crate) shares: ResultShareManager<Request>,
    pub(crate) memory_cache: MemoryCache,
    pub(crate) bitmap_pool: Arc<BitmapPool>,
    pub(crate) disk_cache: Arc<DiskCache>,
    pub(crate) downloader: Arc<dyn Downloader>,
    pub(crate) decoder: Arc<dyn Decoder>,
    pub(crate) uri_models: UriModelRegistry,
    pause_download: AtomicBool,
    pause_load: AtomicBool,
    next_id: AtomicU64,
}

impl EngineContext {
    /// Starts the executor and callback task on `handle`.
    #[must_use]
    pub fn new(components: EngineComponents, executor: ExecutorConfig, handle: &Handle) -> Self {
        let EngineComponents {
            memory_cache,
            bitmap_pool,
            disk_cache,
            downloader,
            decoder,
            uri_models,
        } = components;
        let pool: Arc<dyn BitmapProvider> = bitmap_pool.clone();

        Self {
            executor: RequestExecutor::new(executor, handle.clone()),
            callbacks: CallbackDispatcher::new(handle),
            shares: ResultShareManager::new(),
            memory_cache: memory_cache.with_bitmap_pool(pool),
            bitmap_pool,
            disk_cache,
            downloader,
            decoder,
            uri_models,
            pause_download: AtomicBool::new(false),
            pause_load: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Decoded image cache.
    #[must_use]
    pub const fn memory_cache(&self) -> &MemoryCache {
        &self.memory_cache
    }

    /// Reusable pixel buffers.
    #[must_use]
    pub fn bitmap_pool(&self) -> &BitmapPool {
        &self.bitmap_pool
    }

    /// Downloaded byte cache.
    #[must_use]
    pub const fn disk_cache(&self) -> &Arc<DiskCache> {
        &self.disk_cache
    }

    /// URI scheme strategies.
    #[must_use]
    pub const fn uri_models(&self) -> &UriModelRegistry {
        &self.uri_models
    }

    /// Phase scheduler.
    #[must_use]
    pub const fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Share bookkeeping.
    #[must_use]
    pub const fn shares(&self) -> &ResultShareManager<Request> {
        &self.shares
    }

    /// While set, network requests are lowered to the local level.
    pub fn set_pause_download(&self, paused: bool) {
        if self.pause_download.swap(paused, Ordering::AcqRel) != paused {
            debug!(paused, "Pause download toggled");
        }
    }

    /// Returns true while downloads are paused.
    #[must_use]
    pub fn is_pause_download(&self) -> bool {
        self.pause_download.load(Ordering::Acquire)
    }

    /// While set, display requests are lowered to the memory level.
    pub fn set_pause_load(&self, paused: bool) {
        if self.pause_load.swap(paused, Ordering::AcqRel) != paused {
            debug!(paused, "Pause load toggled");
        }
    }

    /// Returns true while loads are paused.
    #[must_use]
    pub fn is_pause_load(&self) -> bool {
        self.pause_load.load(Ordering::Acquire)
    }

    /// Stops the executor and callback task. Idempotent.
    pub fn shutdown(&self) {
        self.executor.shutdown();
        self.callbacks.shutdown();
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("executor", &self.executor)
            .field("memory_cache", &self.memory_cache.stats())
            .field("disk_cache", &self.disk_cache)
            .field("uri_models", &self.uri_models)
            .finish_non_exhaustive()
    }
}
