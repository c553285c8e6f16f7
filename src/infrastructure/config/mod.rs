//! Application configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{AppConfig, EngineConfig, LogLevel};
pub use args::{CliArgs, Command, FetchArgs};
pub use storage::{ConfigError, StorageManager};
