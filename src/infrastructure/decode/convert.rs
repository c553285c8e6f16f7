//! Conversions between pooled bitmaps and `image` buffers.

use image::imageops::FilterType;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

use crate::domain::entities::{Bitmap, PixelFormat};
use crate::domain::ports::BitmapProvider;

pub(super) const fn filter(low_quality: bool) -> FilterType {
    if low_quality {
        FilterType::Triangle
    } else {
        FilterType::Lanczos3
    }
}

/// Layout that keeps every channel the image has.
pub(super) fn natural_format(image: &DynamicImage) -> PixelFormat {
    let color = image.color();
    match (color.has_color(), color.has_alpha()) {
        (true, true) => PixelFormat::Rgba8888,
        (true, false) => PixelFormat::Rgb888,
        (false, true) => PixelFormat::La88,
        (false, false) => PixelFormat::L8,
    }
}

pub(super) fn to_dynamic(bitmap: &Bitmap) -> Option<DynamicImage> {
    let (width, height) = (bitmap.width(), bitmap.height());
    let pixels = bitmap.pixels().to_vec();
    match bitmap.format() {
        PixelFormat::Rgba8888 => RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
        PixelFormat::Rgb888 => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        PixelFormat::La88 => GrayAlphaImage::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8),
        PixelFormat::L8 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
    }
}

/// Copies `image` into a bitmap of `format`, reusing a pooled buffer when allowed.
pub(super) fn into_bitmap(
    image: &DynamicImage,
    format: PixelFormat,
    pool: &dyn BitmapProvider,
    use_pool: bool,
) -> Bitmap {
    let raw = match format {
        PixelFormat::Rgba8888 => image.to_rgba8().into_raw(),
        PixelFormat::Rgb888 => image.to_rgb8().into_raw(),
        PixelFormat::La88 => image.to_luma_alpha8().into_raw(),
        PixelFormat::L8 => image.to_luma8().into_raw(),
    };
    let (width, height) = (image.width(), image.height());

    if use_pool {
        let mut bitmap = pool.take_or_alloc(width, height, format);
        bitmap.pixels_mut().copy_from_slice(&raw);
        bitmap
    } else {
        Bitmap::from_pixels(width, height, format, raw)
            .unwrap_or_else(|| Bitmap::new(width, height, format))
    }
}
