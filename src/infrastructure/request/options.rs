//! Frozen per-request option sets and the keys derived from them.
//!
//! Options compose rather than inherit: a display request carries load
//! options, which carry download options.

use std::sync::Arc;

use crate::domain::entities::{CachePolicy, MaxSize, PixelFormat, RequestKind, RequestLevel, Resize};
use crate::domain::ports::{DecodeOptions, ImageProcessor};
use crate::infrastructure::decode::ResizeProcessor;

/// Options shared by every request kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// How far the request may go.
    pub request_level: RequestLevel,
    /// Disk cache permissions.
    pub disk_cache_policy: CachePolicy,
}

impl DownloadOptions {
    fn append_behavior_key(&self, key: &mut String) {
        key.push_str(&format!("_Level({})", self.request_level.as_str()));
        key.push_str(&format!("_DiskCache({})", self.disk_cache_policy.as_str()));
    }
}

/// Options for requests that decode.
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Download options.
    pub download: DownloadOptions,
    /// Decode no larger than this.
    pub max_size: Option<MaxSize>,
    /// Resize after decoding.
    pub resize: Option<Resize>,
    /// Processors applied after the resize, in order.
    pub processors: Vec<Arc<dyn ImageProcessor>>,
    /// Preferred pixel layout.
    pub pixel_format: Option<PixelFormat>,
    /// Favour speed over quality when scaling.
    pub low_quality_image: bool,
    /// Skip the bitmap pool for this request.
    pub bitmap_pool_disabled: bool,
}

impl LoadOptions {
    /// Decoder parameters for these options.
    #[must_use]
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_size: self.max_size,
            pixel_format: self.pixel_format,
            low_quality: self.low_quality_image,
            use_bitmap_pool: !self.bitmap_pool_disabled,
        }
    }

    /// Processors to run, the resize first.
    #[must_use]
    pub fn effective_processors(&self) -> Vec<Arc<dyn ImageProcessor>> {
        let mut processors: Vec<Arc<dyn ImageProcessor>> = Vec::with_capacity(self.processors.len() + 1);
        if let Some(resize) = self.resize {
            processors.push(Arc::new(ResizeProcessor::new(resize, self.low_quality_image)));
        }
        processors.extend(self.processors.iter().cloned());
        processors
    }

    fn append_content_key(&self, key: &mut String) {
        if let Some(max_size) = &self.max_size {
            key.push('_');
            key.push_str(&max_size.key());
        }
        if let Some(resize) = &self.resize {
            key.push('_');
            key.push_str(&resize.key());
        }
        for processor in &self.processors {
            key.push_str(&format!("_Processor({})", processor.key()));
        }
        if let Some(format) = self.pixel_format {
            key.push_str(&format!("_Format({})", format.as_str()));
        }
        if self.low_quality_image {
            key.push_str("_LowQuality");
        }
    }

    fn append_behavior_key(&self, key: &mut String) {
        self.download.append_behavior_key(key);
        if self.bitmap_pool_disabled {
            key.push_str("_NoBitmapPool");
        }
    }
}

impl std::fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let processors: Vec<String> = self.processors.iter().map(|p| p.key()).collect();
        f.debug_struct("LoadOptions")
            .field("download", &self.download)
            .field("max_size", &self.max_size)
            .field("resize", &self.resize)
            .field("processors", &processors)
            .field("pixel_format", &self.pixel_format)
            .field("low_quality_image", &self.low_quality_image)
            .field("bitmap_pool_disabled", &self.bitmap_pool_disabled)
            .finish()
    }
}

/// Options for requests served through the memory cache.
#[derive(Debug, Clone, Default)]
pub struct DisplayOptions {
    /// Load options.
    pub load: LoadOptions,
    /// Memory cache permissions.
    pub memory_cache_policy: CachePolicy,
}

/// The frozen option set of one request.
#[derive(Debug, Clone)]
pub enum RequestOptions {
    /// Download request options.
    Download(DownloadOptions),
    /// Load request options.
    Load(LoadOptions),
    /// Display request options.
    Display(DisplayOptions),
}

impl RequestOptions {
    /// Kind of request these options belong to.
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Download(_) => RequestKind::Download,
            Self::Load(_) => RequestKind::Load,
            Self::Display(_) => RequestKind::Display,
        }
    }

    /// Download options.
    #[must_use]
    pub const fn download(&self) -> &DownloadOptions {
        match self {
            Self::Download(options) => options,
            Self::Load(options) => &options.download,
            Self::Display(options) => &options.load.download,
        }
    }

    /// Load options, unless this is a download request.
    #[must_use]
    pub const fn load(&self) -> Option<&LoadOptions> {
        match self {
            Self::Download(_) => None,
            Self::Load(options) => Some(options),
            Self::Display(options) => Some(&options.load),
        }
    }

    /// Display options, for display requests only.
    #[must_use]
    pub const fn display(&self) -> Option<&DisplayOptions> {
        match self {
            Self::Display(options) => Some(options),
            Self::Download(_) | Self::Load(_) => None,
        }
    }

    /// Request level.
    #[must_use]
    pub const fn request_level(&self) -> RequestLevel {
        self.download().request_level
    }

    pub(crate) fn set_request_level(&mut self, level: RequestLevel) {
        match self {
            Self::Download(options) => options.request_level = level,
            Self::Load(options) => options.download.request_level = level,
            Self::Display(options) => options.load.download.request_level = level,
        }
    }

    /// Memory cache policy; disabled for kinds that never touch the memory
    /// cache.
    #[must_use]
    pub fn memory_cache_policy(&self) -> CachePolicy {
        self.display()
            .map_or(CachePolicy::Disabled, |options| options.memory_cache_policy)
    }

    fn append_content_key(&self, key: &mut String) {
        if let Some(load) = self.load() {
            load.append_content_key(key);
        }
    }

    /// Key covering only options that change the produced pixels. Without
    /// such options it is the bare URI.
    #[must_use]
    pub fn memory_cache_key(&self, uri: &str) -> String {
        let mut options = String::new();
        self.append_content_key(&mut options);
        join_key(uri, &options)
    }

    /// Key covering every option that changes how the request behaves.
    #[must_use]
    pub fn request_key(&self, uri: &str) -> String {
        let mut options = String::new();
        self.append_content_key(&mut options);
        options.push_str(&format!("_Kind({})", self.kind()));
        match self {
            Self::Download(download) => download.append_behavior_key(&mut options),
            Self::Load(load) => load.append_behavior_key(&mut options),
            Self::Display(display) => {
                display.load.append_behavior_key(&mut options);
                options.push_str(&format!("_MemoryCache({})", display.memory_cache_policy.as_str()));
            }
        }
        join_key(uri, &options)
    }
}

/// Separates the URI from the option part of a key. URIs containing it are
/// rejected, so a URI can never pose as another URI plus options.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// `options` is a run of `_Name(..)` segments, possibly empty.
fn join_key(uri: &str, options: &str) -> String {
    match options.strip_prefix('_') {
        Some(options) => format!("{uri}{KEY_SEPARATOR}{options}"),
        None => uri.to_string(),
    }
}
