//! Collaborator ports consumed by the engine.

mod decoder_port;
mod downloader_port;
mod processor_port;
mod request_listener_port;
mod uri_model_port;

pub use decoder_port::{BitmapProvider, DecodeOptions, Decoded, Decoder};
#[cfg(test)]
pub use downloader_port::MockDownloader;
pub use downloader_port::{DownloadResponse, Downloader};
pub use processor_port::ImageProcessor;
#[cfg(test)]
pub use processor_port::MockImageProcessor;
pub use request_listener_port::RequestListener;
pub use uri_model_port::{LocalSource, UriModel};
