//! Application layer: the engine and the request builders.

mod engine;
mod helper;
mod request_slot;

#[cfg(test)]
mod engine_test;

pub use engine::{Engine, EngineBuilder};
pub use helper::{DisplayHelper, DownloadHelper, LoadHelper};
pub use request_slot::RequestSlot;
