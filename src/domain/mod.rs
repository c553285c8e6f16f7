//! Domain layer with core entities, errors and collaborator ports.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CachePolicy, CancelCause, ErrorCause, RequestKind, RequestLevel, Status};
pub use errors::{CacheError, EngineError};
pub use ports::{Decoder, Downloader, ImageProcessor, RequestListener, UriModel};
