//! The engine context callers build requests from.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::domain::errors::{CacheError, EngineError};
use crate::domain::ports::{Decoder, Downloader, UriModel};
use crate::infrastructure::cache::{BitmapPool, DiskCache, MemoryCache};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::decode::ImageDecoder;
use crate::infrastructure::http::HttpDownloader;
use crate::infrastructure::request::{EngineComponents, EngineContext};
use crate::infrastructure::uri::UriModelRegistry;

use super::{DisplayHelper, DownloadHelper, LoadHelper};

/// Owns the caches, the executor and the share manager of one engine
/// instance. Cheap to clone; clones share everything.
#[derive(Debug, Clone)]
pub struct Engine {
    ctx: Arc<EngineContext>,
}

impl Engine {
    /// Builds an engine with the default collaborators.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the disk cache cannot be
    /// opened, or no tokio runtime is running.
    pub async fn new(config: EngineConfig) -> Result<Self, EngineError> {
        EngineBuilder::new(config).build().await
    }

    /// Starts building an engine.
    #[must_use]
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Assembles an engine from ready-made components on the current runtime.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or no tokio runtime is
    /// running.
    pub fn with_components(
        components: EngineComponents,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let handle = Handle::try_current()?;
        let ctx = EngineContext::new(components, config.executor, &handle);
        ctx.set_pause_download(config.pause_download);
        ctx.set_pause_load(config.pause_load);
        Ok(Self { ctx: Arc::new(ctx) })
    }

    /// Fetches bytes into the disk cache.
    pub fn download(&self, uri: impl Into<String>) -> DownloadHelper {
        DownloadHelper::new(Arc::clone(&self.ctx), uri)
    }

    /// Fetches and decodes.
    pub fn load(&self, uri: impl Into<String>) -> LoadHelper {
        LoadHelper::new(Arc::clone(&self.ctx), uri)
    }

    /// Fetches, decodes and serves through the memory cache.
    pub fn display(&self, uri: impl Into<String>) -> DisplayHelper {
        DisplayHelper::new(Arc::clone(&self.ctx), uri)
    }

    /// Shared services.
    #[must_use]
    pub const fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Decoded image cache.
    #[must_use]
    pub fn memory_cache(&self) -> &MemoryCache {
        self.ctx.memory_cache()
    }

    /// Reusable pixel buffers.
    #[must_use]
    pub fn bitmap_pool(&self) -> &BitmapPool {
        self.ctx.bitmap_pool()
    }

    /// Downloaded byte cache.
    #[must_use]
    pub fn disk_cache(&self) -> &Arc<DiskCache> {
        self.ctx.disk_cache()
    }

    /// While set, new network requests stop at the local level.
    pub fn set_pause_download(&self, paused: bool) {
        self.ctx.set_pause_download(paused);
    }

    /// While set, new display requests stop at the memory cache.
    pub fn set_pause_load(&self, paused: bool) {
        self.ctx.set_pause_load(paused);
    }

    /// Releases part of the memory held by the engine. `level` is the share
    /// of the budgets to keep, from 0.0 to 1.0.
    pub fn trim_memory(&self, level: f32) {
        debug!(level, "Trimming memory");
        self.ctx.memory_cache().trim(level);
        if level < 0.5 {
            self.ctx.bitmap_pool().clear();
        }
    }

    /// Drops every unpinned decoded image and every pooled buffer.
    pub fn on_low_memory(&self) {
        info!("Low memory, clearing memory cache and bitmap pool");
        self.ctx.memory_cache().clear();
        self.ctx.bitmap_pool().clear();
    }

    /// Deletes every disk cache entry.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be cleared.
    pub async fn clear_disk_cache(&self) -> Result<(), CacheError> {
        self.ctx.disk_cache().clear().await
    }

    /// Stops the executor; queued requests are canceled. Idempotent.
    pub fn shutdown(&self) {
        info!("Shutting down engine");
        self.ctx.shutdown();
    }
}

/// Builder for [`Engine`] with replaceable collaborators.
#[must_use]
pub struct EngineBuilder {
    config: EngineConfig,
    downloader: Option<Arc<dyn Downloader>>,
    decoder: Option<Arc<dyn Decoder>>,
    uri_models: UriModelRegistry,
}

impl EngineBuilder {
    /// Starts from `config` and the built-in collaborators.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            downloader: None,
            decoder: None,
            uri_models: UriModelRegistry::new(),
        }
    }

    /// Replaces the HTTP downloader.
    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Replaces the image decoder.
    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Adds a URI model ahead of the built-in ones.
    pub fn uri_model(mut self, model: Arc<dyn UriModel>) -> Self {
        self.uri_models.register(model);
        self
    }

    /// Opens the disk cache and starts the engine.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the disk cache cannot be
    /// opened, the HTTP client cannot be built, or no tokio runtime is running.
    pub async fn build(self) -> Result<Engine, EngineError> {
        let Self {
            config,
            downloader,
            decoder,
            uri_models,
        } = self;
        config.validate()?;

        let cache_root = config.effective_cache_dir();
        let disk_cache =
            DiskCache::open_in(&cache_root, config.app_version, config.disk_cache_size).await?;
        disk_cache.set_disabled(!config.disk_cache_enabled);

        let memory_cache = MemoryCache::new(config.memory_cache_size);
        memory_cache.set_disabled(!config.memory_cache_enabled);
        let bitmap_pool = BitmapPool::new(config.bitmap_pool_size);
        bitmap_pool.set_disabled(!config.bitmap_pool_enabled);

        let downloader = match downloader {
            Some(downloader) => downloader,
            None => Arc::new(HttpDownloader::new(&config.http)?),
        };
        let decoder = decoder.unwrap_or_else(|| Arc::new(ImageDecoder));

        info!(
            cache_dir = %disk_cache.dir().display(),
            app_version = config.app_version,
            memory_cache_size = config.memory_cache_size,
            disk_cache_size = config.disk_cache_size,
            "Engine started"
        );

        Engine::with_components(
            EngineComponents {
                memory_cache,
                bitmap_pool: Arc::new(bitmap_pool),
                disk_cache: Arc::new(disk_cache),
                downloader,
                decoder,
                uri_models,
            },
            &config,
        )
    }
}
