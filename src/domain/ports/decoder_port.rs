//! Port definition for turning bytes into bitmaps.

use crate::domain::entities::{Bitmap, ImageInfo, MaxSize, PixelFormat};
use crate::domain::errors::DecodeError;

/// Decode parameters derived from the request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Downscale so the result fits inside this size.
    pub max_size: Option<MaxSize>,
    /// Preferred output layout; the decoder picks one when unset.
    pub pixel_format: Option<PixelFormat>,
    /// Trade quality for speed when scaling.
    pub low_quality: bool,
    /// Allow reusing buffers from the bitmap pool.
    pub use_bitmap_pool: bool,
}

/// A decoded bitmap with the source metadata.
#[derive(Debug)]
pub struct Decoded {
    /// Output pixels.
    pub bitmap: Bitmap,
    /// Source metadata.
    pub info: ImageInfo,
}

/// Source of reusable pixel buffers (the `inBitmap` contract).
pub trait BitmapProvider: Send + Sync {
    /// Returns a buffer already shaped as requested, if one can be reused.
    fn take(&self, width: u32, height: u32, format: PixelFormat) -> Option<Bitmap>;

    /// Offers a buffer back. Returns false if it was dropped instead.
    fn give_back(&self, bitmap: Bitmap) -> bool;

    /// Returns a reused buffer or allocates a fresh one.
    fn take_or_alloc(&self, width: u32, height: u32, format: PixelFormat) -> Bitmap {
        self.take(width, height, format)
            .unwrap_or_else(|| Bitmap::new(width, height, format))
    }
}

/// Port for image decoding. Called on blocking threads.
pub trait Decoder: Send + Sync {
    /// Decodes `data`.
    ///
    /// # Errors
    /// Returns error if the data is not a supported image.
    fn decode(
        &self,
        data: &[u8],
        options: &DecodeOptions,
        pool: &dyn BitmapProvider,
    ) -> Result<Decoded, DecodeError>;
}
