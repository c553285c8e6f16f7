//! Cache layers.
//!
//! This module provides:
//! - Memory caching of decoded images with LRU eviction and pinning
//! - A pool of reusable pixel buffers
//! - Disk caching of downloaded bytes with a persistent journal

pub mod bitmap_pool;
pub mod disk_cache;
pub mod memory_cache;

pub use bitmap_pool::{BitmapPool, DEFAULT_BITMAP_POOL_SIZE};
pub use disk_cache::{DEFAULT_MAX_CACHE_SIZE, DiskCache, DiskEditor, entry_name};
pub use memory_cache::{CacheStats, DEFAULT_MEMORY_CACHE_SIZE, MemoryCache};
