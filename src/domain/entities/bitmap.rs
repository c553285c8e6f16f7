//! Decoded pixel buffers and the metadata that travels with them.

use serde::{Deserialize, Serialize};

/// Pixel layout of a decoded bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit red, green, blue and alpha.
    #[default]
    Rgba8888,
    /// 8-bit red, green and blue.
    Rgb888,
    /// 8-bit luminance and alpha.
    La88,
    /// 8-bit luminance.
    L8,
}

impl PixelFormat {
    /// Bytes used by one pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8888 => 4,
            Self::Rgb888 => 3,
            Self::La88 => 2,
            Self::L8 => 1,
        }
    }

    /// Short tag used in request keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rgba8888 => "rgba8888",
            Self::Rgb888 => "rgb888",
            Self::La88 => "la88",
            Self::L8 => "l8",
        }
    }

    /// Number of bytes a `width` x `height` bitmap needs.
    #[must_use]
    pub const fn byte_count(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// An owned, reusable pixel buffer.
///
/// The backing allocation may be larger than the visible pixels when the buffer
/// came out of the bitmap pool; [`Bitmap::allocation_byte_count`] reports the
/// real footprint.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Allocates a zeroed bitmap.
    #[must_use]
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            pixels: vec![0; format.byte_count(width, height)],
        }
    }

    /// Wraps existing pixels, returning `None` if the length does not match.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == format.byte_count(width, height)).then_some(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Visible pixel bytes.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable visible pixel bytes.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Bytes covered by the visible pixels.
    #[must_use]
    pub const fn byte_count(&self) -> usize {
        self.format.byte_count(self.width, self.height)
    }

    /// Bytes held by the allocation, which is what the caches account for.
    #[must_use]
    pub fn allocation_byte_count(&self) -> usize {
        self.pixels.capacity().max(self.pixels.len())
    }

    /// Reshapes the buffer in place if its allocation is large enough.
    ///
    /// Pixel contents are zeroed on success.
    pub fn reconfigure(&mut self, width: u32, height: u32, format: PixelFormat) -> bool {
        let needed = format.byte_count(width, height);
        if needed > self.allocation_byte_count() {
            return false;
        }
        self.pixels.clear();
        self.pixels.resize(needed, 0);
        self.width = width;
        self.height = height;
        self.format = format;
        true
    }

    /// Consumes the bitmap and returns its pixel bytes.
    #[must_use]
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("allocation", &self.allocation_byte_count())
            .finish()
    }
}

/// Metadata about the source image, independent of the decoded size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Detected MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Width of the encoded image.
    pub width: u32,
    /// Height of the encoded image.
    pub height: u32,
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFrom {
    /// Downloaded during this request.
    Network,
    /// Read from the disk cache.
    DiskCache,
    /// Read from a local file.
    Local,
    /// Decoded from bytes held in memory (e.g. a data URI).
    Memory,
    /// Served from the memory cache without decoding.
    MemoryCache,
}

impl std::fmt::Display for ImageFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::DiskCache => "disk_cache",
            Self::Local => "local",
            Self::Memory => "memory",
            Self::MemoryCache => "memory_cache",
        };
        f.write_str(name)
    }
}

/// Upper bound for the decoded size; the aspect ratio is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaxSize {
    /// Maximum width in pixels.
    pub width: u32,
    /// Maximum height in pixels.
    pub height: u32,
}

impl MaxSize {
    /// Creates a max size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Key fragment.
    #[must_use]
    pub fn key(&self) -> String {
        format!("MaxSize({}x{})", self.width, self.height)
    }
}

/// How a resize treats the source aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Output is exactly the requested size, stretching if needed.
    Exactly,
    /// Output keeps the source aspect ratio and fits inside the requested size.
    #[default]
    AspectRatioSame,
}

/// Target size applied after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resize {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Aspect ratio handling.
    pub mode: ResizeMode,
}

impl Resize {
    /// Creates a resize keeping the aspect ratio.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            mode: ResizeMode::AspectRatioSame,
        }
    }

    /// Creates a resize with an explicit mode.
    #[must_use]
    pub const fn with_mode(width: u32, height: u32, mode: ResizeMode) -> Self {
        Self {
            width,
            height,
            mode,
        }
    }

    /// Key fragment.
    #[must_use]
    pub fn key(&self) -> String {
        let mode = match self.mode {
            ResizeMode::Exactly => "exactly",
            ResizeMode::AspectRatioSame => "aspect",
        };
        format!("Resize({}x{},{mode})", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_byte_count() {
        let bitmap = Bitmap::new(10, 20, PixelFormat::Rgba8888);
        assert_eq!(bitmap.byte_count(), 800);
        assert_eq!(bitmap.pixels().len(), 800);
    }

    #[test]
    fn test_reconfigure_within_capacity() {
        let mut bitmap = Bitmap::new(10, 10, PixelFormat::Rgba8888);
        assert!(bitmap.reconfigure(5, 5, PixelFormat::Rgb888));
        assert_eq!(bitmap.width(), 5);
        assert_eq!(bitmap.format(), PixelFormat::Rgb888);
        assert_eq!(bitmap.pixels().len(), 75);
        assert!(bitmap.allocation_byte_count() >= 400);
    }

    #[test]
    fn test_reconfigure_too_large() {
        let mut bitmap = Bitmap::new(2, 2, PixelFormat::L8);
        assert!(!bitmap.reconfigure(10, 10, PixelFormat::L8));
        assert_eq!(bitmap.width(), 2);
    }

    #[test]
    fn test_from_pixels_rejects_wrong_length() {
        assert!(Bitmap::from_pixels(2, 2, PixelFormat::L8, vec![0; 3]).is_none());
        assert!(Bitmap::from_pixels(2, 2, PixelFormat::L8, vec![0; 4]).is_some());
    }
}
