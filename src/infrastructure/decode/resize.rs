//! Resize after decoding, as an ordinary processor.

use crate::domain::entities::{Bitmap, Resize, ResizeMode};
use crate::domain::errors::ProcessError;
use crate::domain::ports::{BitmapProvider, ImageProcessor};

use super::convert::{filter, into_bitmap, to_dynamic};

/// Resizes decoded bitmaps to a target size.
#[derive(Debug, Clone, Copy)]
pub struct ResizeProcessor {
    resize: Resize,
    low_quality: bool,
}

impl ResizeProcessor {
    /// Creates a resize processor.
    #[must_use]
    pub const fn new(resize: Resize, low_quality: bool) -> Self {
        Self {
            resize,
            low_quality,
        }
    }
}

impl ImageProcessor for ResizeProcessor {
    fn key(&self) -> String {
        self.resize.key()
    }

    fn process(&self, bitmap: Bitmap, pool: &dyn BitmapProvider) -> Result<Bitmap, ProcessError> {
        let Resize { width, height, mode } = self.resize;
        if width == 0 || height == 0 {
            return Err(ProcessError::new(self.key(), "target size must be positive"));
        }
        if bitmap.width() == width && bitmap.height() == height {
            return Ok(bitmap);
        }

        let image = to_dynamic(&bitmap)
            .ok_or_else(|| ProcessError::new(self.key(), "bitmap does not match its format"))?;
        let resized = match mode {
            ResizeMode::Exactly => image.resize_exact(width, height, filter(self.low_quality)),
            ResizeMode::AspectRatioSame => image.resize(width, height, filter(self.low_quality)),
        };
        if resized.width() == bitmap.width() && resized.height() == bitmap.height() {
            return Ok(bitmap);
        }

        let format = bitmap.format();
        pool.give_back(bitmap);
        Ok(into_bitmap(&resized, format, pool, true))
    }
}
