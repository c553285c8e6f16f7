//! pixload - an image loading engine.
//!
//! Requests for a URI are dispatched through a single lane, downloaded and
//! decoded on bounded worker pools, and served through a memory cache, a
//! bitmap pool and a journaled disk cache. Identical concurrent requests share
//! one download and one decode.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer with the engine and request builders.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing the engines and adapters.
pub mod infrastructure;

pub use application::{DisplayHelper, DownloadHelper, Engine, EngineBuilder, LoadHelper, RequestSlot};

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "pixload";
