//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::args::CliArgs;
use crate::domain::errors::EngineError;
use crate::infrastructure::cache::{
    DEFAULT_BITMAP_POOL_SIZE, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MEMORY_CACHE_SIZE,
};
use crate::infrastructure::executor::ExecutorConfig;
use crate::infrastructure::http::HttpConfig;

pub(crate) const APP_NAME: &str = "pixload";
pub(crate) const APP_QUALIFIER: &str = "org";
pub(crate) const APP_ORGANIZATION: &str = "pixload";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration from file and CLI.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Engine configuration.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bumping this discards the disk cache.
    pub app_version: u32,

    /// Root directory for the disk cache; the platform cache dir when unset.
    pub cache_dir: Option<PathBuf>,

    /// Memory cache budget in bytes.
    pub memory_cache_size: usize,

    /// Bitmap pool budget in bytes.
    pub bitmap_pool_size: usize,

    /// Disk cache budget in bytes.
    pub disk_cache_size: u64,

    /// Enable the memory cache.
    pub memory_cache_enabled: bool,

    /// Enable the bitmap pool.
    pub bitmap_pool_enabled: bool,

    /// Enable the disk cache.
    pub disk_cache_enabled: bool,

    /// Lower network requests to the local level.
    pub pause_download: bool,

    /// Lower display requests to the memory level.
    pub pause_load: bool,

    /// Worker pools.
    pub executor: ExecutorConfig,

    /// HTTP client.
    pub http: HttpConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_version: 1,
            cache_dir: None,
            memory_cache_size: DEFAULT_MEMORY_CACHE_SIZE,
            bitmap_pool_size: DEFAULT_BITMAP_POOL_SIZE,
            disk_cache_size: DEFAULT_MAX_CACHE_SIZE,
            memory_cache_enabled: true,
            bitmap_pool_enabled: true,
            disk_cache_enabled: true,
            pause_download: false,
            pause_load: false,
            executor: ExecutorConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Checks the values an engine cannot start with.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.executor.download_workers == 0 {
            return Err(EngineError::invalid_config("executor.download_workers must be > 0"));
        }
        if self.executor.load_workers == 0 {
            return Err(EngineError::invalid_config("executor.load_workers must be > 0"));
        }
        if self.executor.queue_capacity == 0 {
            return Err(EngineError::invalid_config("executor.queue_capacity must be > 0"));
        }
        if self.disk_cache_size == 0 {
            return Err(EngineError::invalid_config("disk_cache_size must be > 0"));
        }
        if self.http.timeout_secs == 0 {
            return Err(EngineError::invalid_config("http.timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Returns the effective cache root.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
                std::env::temp_dir,
                |dirs| {
                    dirs.cache_dir()
                        .parent()
                        .map_or_else(|| dirs.cache_dir().to_path_buf(), std::path::Path::to_path_buf)
                },
            )
        })
    }
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.engine.cache_dir = Some(cache_dir.clone());
        }
        if let Some(app_version) = args.app_version {
            self.engine.app_version = app_version;
        }
        if let Some(workers) = args.download_workers {
            self.engine.executor.download_workers = workers;
        }
        if let Some(workers) = args.load_workers {
            self.engine.executor.load_workers = workers;
        }
        if let Some(timeout) = args.http_timeout {
            self.engine.http.timeout_secs = timeout;
        }
        if args.no_disk_cache {
            self.engine.disk_cache_enabled = false;
        }
        if args.pause_download {
            self.engine.pause_download = true;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("pixload.log"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}
