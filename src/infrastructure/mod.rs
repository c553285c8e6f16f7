//! Infrastructure layer with the engines and collaborator adapters.

/// Memory cache, bitmap pool and disk cache.
pub mod cache;
/// Application configuration.
pub mod config;
/// Default decoder and processors.
pub mod decode;
/// Dispatch lane, worker pools and callback delivery.
pub mod executor;
/// HTTP downloader.
pub mod http;
/// Requests and the phases that drive them.
pub mod request;
/// Result sharing between identical requests.
pub mod share;
/// URI schemes.
pub mod uri;

pub use cache::{BitmapPool, CacheStats, DiskCache, MemoryCache};
pub use config::{AppConfig, CliArgs, EngineConfig, LogLevel, StorageManager};
pub use decode::{ImageDecoder, ResizeProcessor};
pub use executor::{ExecutorConfig, RequestExecutor};
pub use http::{HttpConfig, HttpDownloader};
pub use request::{
    DisplayOptions, DownloadOptions, EngineComponents, EngineContext, LoadOptions, Request,
    RequestHandle, RequestOptions,
};
pub use share::ResultShareManager;
pub use uri::{DataUriModel, FileUriModel, HttpUriModel, UriModelRegistry};
