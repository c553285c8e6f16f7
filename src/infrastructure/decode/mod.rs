//! Default decoder and built-in processors.

mod convert;
mod image_decoder;
mod resize;

pub use image_decoder::ImageDecoder;
pub use resize::ResizeProcessor;
