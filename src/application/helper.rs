//! Builders that validate, adjust and submit requests.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::entities::{
    CachePolicy, CancelCause, ErrorCause, MaxSize, Outcome, PixelFormat, RequestKind,
    RequestLevel, Resize,
};
use crate::domain::ports::{ImageProcessor, RequestListener};
use crate::infrastructure::request::{
    DisplayOptions, DownloadOptions, EngineContext, KEY_SEPARATOR, LoadOptions, Request,
    RequestHandle, RequestOptions, RequestSpec, launch, run_inline,
};

use super::RequestSlot;

/// State every helper carries besides its options.
struct Submission {
    ctx: Arc<EngineContext>,
    uri: String,
    listener: Option<Arc<dyn RequestListener>>,
    sync: bool,
}

impl Submission {
    fn new(ctx: Arc<EngineContext>, uri: impl Into<String>) -> Self {
        Self {
            ctx,
            uri: uri.into(),
            listener: None,
            sync: false,
        }
    }

    /// Validates the URI, applies the global pause flags and creates the
    /// request. Invalid requests come back already failed.
    fn build(self, mut options: RequestOptions) -> Arc<Request> {
        let Self {
            ctx,
            uri,
            listener,
            sync,
        } = self;
        let kind = options.kind();

        let model = if uri.trim().is_empty() || uri.contains(KEY_SEPARATOR) {
            Err(ErrorCause::UriInvalid)
        } else {
            match ctx.uri_models.find(&uri) {
                None => Err(ErrorCause::UriNoSupport),
                Some(model) if kind == RequestKind::Download && !model.is_network() => {
                    Err(ErrorCause::UriNoSupport)
                }
                Some(model) => Ok(model),
            }
        };

        let model = match model {
            Ok(model) => model,
            Err(cause) => {
                warn!(uri = %uri, %kind, ?cause, "Rejected request");
                let request = Request::new(
                    ctx,
                    RequestSpec {
                        uri,
                        model: None,
                        options,
                        level_cancel_cause: CancelCause::Normal,
                        sync,
                        listener,
                    },
                );
                request.fail(cause);
                return request;
            }
        };

        let level = options.request_level();
        let mut level_cancel_cause = level.cancel_cause();
        if kind == RequestKind::Display && ctx.is_pause_load() && level > RequestLevel::Memory {
            options.set_request_level(RequestLevel::Memory);
            level_cancel_cause = CancelCause::PauseLoad;
        } else if model.is_network() && ctx.is_pause_download() && level == RequestLevel::Net {
            options.set_request_level(RequestLevel::Local);
            level_cancel_cause = CancelCause::PauseDownload;
        }
        if options.request_level() != level {
            debug!(uri = %uri, from = level.as_str(), to = options.request_level().as_str(), "Request level lowered");
        }

        Request::new(
            ctx,
            RequestSpec {
                uri,
                model: Some(model),
                options,
                level_cancel_cause,
                sync,
                listener,
            },
        )
    }

    fn commit(self, options: RequestOptions) -> RequestHandle {
        let request = self.build(options);
        launch(Arc::clone(&request));
        RequestHandle::new(request)
    }

    /// Runs the request to completion in the calling task.
    async fn execute(mut self, options: RequestOptions) -> Outcome {
        self.sync = true;
        let request = self.build(options);
        if !request.is_finished() {
            request.notify_started();
            run_inline(Arc::clone(&request)).await;
        }
        RequestHandle::new(request).wait().await
    }
}

/// Builder for a download request.
#[must_use = "a helper does nothing until committed"]
pub struct DownloadHelper {
    submission: Submission,
    options: DownloadOptions,
}

impl DownloadHelper {
    pub(crate) fn new(ctx: Arc<EngineContext>, uri: impl Into<String>) -> Self {
        Self {
            submission: Submission::new(ctx, uri),
            options: DownloadOptions::default(),
        }
    }

    /// How far the request may go.
    pub fn request_level(mut self, level: RequestLevel) -> Self {
        self.options.request_level = level;
        self
    }

    /// Disk cache permissions.
    pub fn disk_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.options.disk_cache_policy = policy;
        self
    }

    /// Replaces every option at once.
    pub fn options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    /// Receives the lifecycle callbacks.
    pub fn listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.submission.listener = Some(listener);
        self
    }

    /// Runs every phase back to back on one task instead of the worker
    /// pools, delivering callbacks on that task. [`Self::commit`] spawns the
    /// task and returns at once; [`Self::execute`] runs it in the caller's
    /// task.
    pub fn sync(mut self, sync: bool) -> Self {
        self.submission.sync = sync;
        self
    }

    /// Validates and submits the request.
    pub fn commit(self) -> RequestHandle {
        self.submission.commit(RequestOptions::Download(self.options))
    }

    /// Runs the request in the calling task and returns its outcome.
    pub async fn execute(self) -> Outcome {
        self.submission.execute(RequestOptions::Download(self.options)).await
    }
}

/// Builder for a load request.
#[must_use = "a helper does nothing until committed"]
pub struct LoadHelper {
    submission: Submission,
    options: LoadOptions,
}

impl LoadHelper {
    pub(crate) fn new(ctx: Arc<EngineContext>, uri: impl Into<String>) -> Self {
        Self {
            submission: Submission::new(ctx, uri),
            options: LoadOptions::default(),
        }
    }

    /// How far the request may go.
    pub fn request_level(mut self, level: RequestLevel) -> Self {
        self.options.download.request_level = level;
        self
    }

    /// Disk cache permissions.
    pub fn disk_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.options.download.disk_cache_policy = policy;
        self
    }

    /// Decode no larger than `width` x `height`.
    pub fn max_size(mut self, width: u32, height: u32) -> Self {
        self.options.max_size = Some(MaxSize::new(width, height));
        self
    }

    /// Resize after decoding.
    pub fn resize(mut self, resize: Resize) -> Self {
        self.options.resize = Some(resize);
        self
    }

    /// Appends a processor; processors run in the order added.
    pub fn processor(mut self, processor: Arc<dyn ImageProcessor>) -> Self {
        self.options.processors.push(processor);
        self
    }

    /// Output pixel layout.
    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.options.pixel_format = Some(format);
        self
    }

    /// Trade quality for speed when scaling.
    pub fn low_quality_image(mut self, low_quality: bool) -> Self {
        self.options.low_quality_image = low_quality;
        self
    }

    /// Never reuse pooled buffers for this request.
    pub fn disable_bitmap_pool(mut self, disabled: bool) -> Self {
        self.options.bitmap_pool_disabled = disabled;
        self
    }

    /// Replaces every option at once.
    pub fn options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Receives the lifecycle callbacks.
    pub fn listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.submission.listener = Some(listener);
        self
    }

    /// Runs every phase back to back on one task instead of the worker
    /// pools, delivering callbacks on that task. [`Self::commit`] spawns the
    /// task and returns at once; [`Self::execute`] runs it in the caller's
    /// task.
    pub fn sync(mut self, sync: bool) -> Self {
        self.submission.sync = sync;
        self
    }

    /// Validates and submits the request.
    pub fn commit(self) -> RequestHandle {
        self.submission.commit(RequestOptions::Load(self.options))
    }

    /// Runs the request in the calling task and returns its outcome.
    pub async fn execute(self) -> Outcome {
        self.submission.execute(RequestOptions::Load(self.options)).await
    }
}

/// Builder for a display request.
#[must_use = "a helper does nothing until committed"]
pub struct DisplayHelper {
    submission: Submission,
    options: DisplayOptions,
    slot: Option<RequestSlot>,
}

impl DisplayHelper {
    pub(crate) fn new(ctx: Arc<EngineContext>, uri: impl Into<String>) -> Self {
        Self {
            submission: Submission::new(ctx, uri),
            options: DisplayOptions::default(),
            slot: None,
        }
    }

    /// How far the request may go.
    pub fn request_level(mut self, level: RequestLevel) -> Self {
        self.options.load.download.request_level = level;
        self
    }

    /// Disk cache permissions.
    pub fn disk_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.options.load.download.disk_cache_policy = policy;
        self
    }

    /// Memory cache permissions.
    pub fn memory_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.options.memory_cache_policy = policy;
        self
    }

    /// Decode no larger than `width` x `height`.
    pub fn max_size(mut self, width: u32, height: u32) -> Self {
        self.options.load.max_size = Some(MaxSize::new(width, height));
        self
    }

    /// Resize after decoding.
    pub fn resize(mut self, resize: Resize) -> Self {
        self.options.load.resize = Some(resize);
        self
    }

    /// Appends a processor; processors run in the order added.
    pub fn processor(mut self, processor: Arc<dyn ImageProcessor>) -> Self {
        self.options.load.processors.push(processor);
        self
    }

    /// Output pixel layout.
    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.options.load.pixel_format = Some(format);
        self
    }

    /// Trade quality for speed when scaling.
    pub fn low_quality_image(mut self, low_quality: bool) -> Self {
        self.options.load.low_quality_image = low_quality;
        self
    }

    /// Never reuse pooled buffers for this request.
    pub fn disable_bitmap_pool(mut self, disabled: bool) -> Self {
        self.options.load.bitmap_pool_disabled = disabled;
        self
    }

    /// Replaces every option at once.
    pub fn options(mut self, options: DisplayOptions) -> Self {
        self.options = options;
        self
    }

    /// Receives the lifecycle callbacks.
    pub fn listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.submission.listener = Some(listener);
        self
    }

    /// Runs every phase back to back on one task instead of the worker
    /// pools, delivering callbacks on that task. [`Self::commit`] spawns the
    /// task and returns at once; [`Self::execute`] runs it in the caller's
    /// task.
    pub fn sync(mut self, sync: bool) -> Self {
        self.submission.sync = sync;
        self
    }

    /// Ties the request to `slot`: a live request there with the same key is
    /// reused, any other is replaced.
    pub fn into_slot(mut self, slot: &RequestSlot) -> Self {
        self.slot = Some(slot.clone());
        self
    }

    /// Validates and submits the request.
    pub fn commit(self) -> RequestHandle {
        let Self {
            submission,
            options,
            slot,
        } = self;
        let options = RequestOptions::Display(options);
        match slot {
            None => submission.commit(options),
            Some(slot) => {
                let key = options.request_key(&submission.uri);
                slot.replace_with(&key, move || submission.commit(options)).0
            }
        }
    }

    /// Runs the request in the calling task and returns its outcome.
    pub async fn execute(self) -> Outcome {
        self.submission
            .execute(RequestOptions::Display(self.options))
            .await
    }
}
