//! Default decoder built on the `image` crate.

use image::{DynamicImage, ImageFormat};
use tracing::trace;

use crate::domain::entities::{ImageInfo, MaxSize};
use crate::domain::errors::DecodeError;
use crate::domain::ports::{BitmapProvider, DecodeOptions, Decoded, Decoder};

use super::convert::{filter, into_bitmap, natural_format};

/// Decoder for PNG, JPEG and WebP backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDecoder;

impl ImageDecoder {
    fn downscale(image: DynamicImage, max_size: Option<MaxSize>, low_quality: bool) -> DynamicImage {
        let Some(max) = max_size else {
            return image;
        };
        if max.width == 0 || max.height == 0 {
            return image;
        }
        if image.width() <= max.width && image.height() <= max.height {
            return image;
        }
        image.resize(max.width, max.height, filter(low_quality))
    }
}

impl Decoder for ImageDecoder {
    fn decode(
        &self,
        data: &[u8],
        options: &DecodeOptions,
        pool: &dyn BitmapProvider,
    ) -> Result<Decoded, DecodeError> {
        let format = image::guess_format(data).map_err(|_| DecodeError::UnknownFormat)?;
        let image = image::load_from_memory_with_format(data, format)
            .map_err(|e| DecodeError::malformed(e.to_string()))?;

        let info = ImageInfo {
            mime_type: mime_type(format).to_string(),
            width: image.width(),
            height: image.height(),
        };
        if info.width == 0 || info.height == 0 {
            return Err(DecodeError::Empty {
                width: info.width,
                height: info.height,
            });
        }

        let image = Self::downscale(image, options.max_size, options.low_quality);
        let pixel_format = options.pixel_format.unwrap_or_else(|| natural_format(&image));
        let bitmap = into_bitmap(&image, pixel_format, pool, options.use_bitmap_pool);

        trace!(
            mime = %info.mime_type,
            source_width = info.width,
            source_height = info.height,
            width = bitmap.width(),
            height = bitmap.height(),
            "Decoded image"
        );

        Ok(Decoded { bitmap, info })
    }
}

fn mime_type(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}
