//! The dispatch, download and load phases.
//!
//! Each phase returns what should happen next. Asynchronous requests hop
//! between the dispatch lane and the pools; synchronous requests run every
//! phase back to back in one task.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tracing::{debug, error, trace, warn};

use crate::domain::entities::{
    Bitmap, CachedImage, CancelCause, DownloadData, DownloadResult, ErrorCause, ImageFrom,
    PixelFormat, RequestKind, RequestLevel, RequestResult, Status,
};
use crate::domain::ports::{BitmapProvider, Decoded, LocalSource};
use crate::infrastructure::executor::Job;
use crate::infrastructure::share::ShareOutcome;

use super::Request;

/// Where a load phase reads its bytes from.
#[derive(Debug, Clone)]
pub(crate) enum DataSource {
    /// Downloaded bytes, on disk or in memory.
    Downloaded { data: DownloadData, from: ImageFrom },
    /// A local file or in-memory URI.
    Local(LocalSource),
}

impl DataSource {
    const fn image_from(&self) -> ImageFrom {
        match self {
            Self::Downloaded { from, .. } => *from,
            Self::Local(source) => source.image_from(),
        }
    }

    async fn read(&self) -> std::io::Result<Bytes> {
        match self {
            Self::Downloaded { data, .. } => data.read().await,
            Self::Local(source) => source.read().await,
        }
    }
}

/// What a phase asks for next.
pub(crate) enum Next {
    Download,
    Load(DataSource),
    Done,
}

/// Starts a freshly created request. Synchronous requests get a task of
/// their own and never touch the pools.
pub(crate) fn launch(request: Arc<Request>) {
    if request.is_finished() {
        return;
    }
    request.notify_started();
    if request.is_sync() {
        let handle = request.ctx().executor.handle().clone();
        handle.spawn(run_inline(request));
    } else {
        submit_dispatch(request);
    }
}

/// Runs every phase in the current task.
pub(crate) async fn run_inline(request: Arc<Request>) {
    let mut next = dispatch(&request).await;
    loop {
        next = match next {
            Next::Done => break,
            Next::Download => {
                request.advance(Status::WaitDownload);
                download(&request).await
            }
            Next::Load(source) => {
                request.advance(Status::WaitLoad);
                load(&request, source).await
            }
        };
    }
}

/// Queues the dispatch phase, e.g. again after a share ended.
pub(crate) fn submit_dispatch(request: Arc<Request>) {
    if !request.advance(Status::WaitDispatch) {
        return;
    }
    let ctx = Arc::clone(request.ctx());
    let job_request = Arc::clone(&request);
    let submitted = ctx.executor.submit_dispatch(async move {
        let next = dispatch(&job_request).await;
        schedule(job_request, next);
    });
    if !submitted {
        request.cancel(CancelCause::Normal);
    }
}

fn schedule(request: Arc<Request>, next: Next) {
    let ctx = Arc::clone(request.ctx());
    let discard_request = Arc::clone(&request);
    let submitted = match next {
        Next::Done => return,
        Next::Download => {
            if !request.advance(Status::WaitDownload) {
                return;
            }
            let job_request = Arc::clone(&request);
            ctx.executor.submit_download(
                Job::new(async move {
                    let next = download(&job_request).await;
                    schedule(job_request, next);
                })
                .on_discard(move || {
                    discard_request.cancel(CancelCause::Discarded);
                }),
            )
        }
        Next::Load(source) => {
            if !request.advance(Status::WaitLoad) {
                return;
            }
            let job_request = Arc::clone(&request);
            ctx.executor.submit_load(
                Job::new(async move {
                    let next = load(&job_request, source).await;
                    schedule(job_request, next);
                })
                .on_discard(move || {
                    discard_request.cancel(CancelCause::Discarded);
                }),
            )
        }
    };
    if !submitted {
        request.cancel(CancelCause::Normal);
    }
}

/// Cheap decisions: caches, level gate, sharing, routing.
async fn dispatch(request: &Arc<Request>) -> Next {
    if !request.advance(Status::StartDispatch) {
        return Next::Done;
    }
    let ctx = request.ctx();
    let Some(model) = request.model().cloned() else {
        request.fail(ErrorCause::UriNoSupport);
        return Next::Done;
    };
    let level = request.request_level();

    if request.kind() == RequestKind::Display {
        if request.options().memory_cache_policy().is_readable() {
            if let Some(image) = ctx.memory_cache.get(request.memory_cache_key()) {
                debug!(id = request.id(), key = %request.memory_cache_key(), "Served from memory cache");
                request.complete_image(image, ImageFrom::MemoryCache);
                return Next::Done;
            }
        }
        if level == RequestLevel::Memory {
            request.cancel_at_level_gate();
            return Next::Done;
        }
        if !request.is_display_leader() && request.can_share_display() {
            if ctx.shares.request_attach_display(request) {
                request.advance(Status::WaitLoad);
                return Next::Done;
            }
            match ctx.shares.register_display_provider(request) {
                Ok(()) => request.set_display_leader(),
                Err(e) => error!(id = request.id(), error = %e, "Display share registration failed"),
            }
        }
    } else if level == RequestLevel::Memory {
        request.cancel_at_level_gate();
        return Next::Done;
    }

    if !model.is_network() {
        return match model.local_source(request.uri()) {
            Ok(source) => Next::Load(DataSource::Local(source)),
            Err(e) => {
                warn!(id = request.id(), uri = %request.uri(), error = %e, "Local source unavailable");
                request.fail(ErrorCause::DataSourceUnavailable);
                Next::Done
            }
        };
    }

    // Index lookup only; the download phase reads the entry.
    if request.options().download().disk_cache_policy.is_readable()
        && ctx.disk_cache.exist(request.disk_cache_key()).await
    {
        trace!(id = request.id(), key = %request.disk_cache_key(), "Disk cache entry found on dispatch");
        return Next::Download;
    }

    if level == RequestLevel::Local {
        request.cancel_at_level_gate();
        return Next::Done;
    }

    if !request.is_download_leader() && request.can_share_download() {
        if ctx.shares.request_attach_download(request) {
            request.advance(Status::WaitDownload);
            return Next::Done;
        }
        match ctx.shares.register_download_provider(request) {
            Ok(()) => request.set_download_leader(),
            Err(e) => error!(id = request.id(), error = %e, "Download share registration failed"),
        }
    }

    Next::Download
}

fn after_download(request: &Arc<Request>, data: DownloadData, from: ImageFrom) -> Next {
    if request.kind() == RequestKind::Download {
        request.complete(RequestResult::Download(DownloadResult { data, from }));
        Next::Done
    } else {
        Next::Load(DataSource::Downloaded { data, from })
    }
}

/// Network and disk I/O.
async fn download(request: &Arc<Request>) -> Next {
    if !request.advance(Status::StartDownload) {
        return Next::Done;
    }
    let ctx = request.ctx();
    let policy = request.options().download().disk_cache_policy;
    let key = request.disk_cache_key();

    request.advance(Status::CheckDiskCache);
    if policy.is_readable() {
        if let Some(entry) = ctx.disk_cache.get(key).await {
            request.release_download_share(ShareOutcome::Completed);
            return after_download(request, DownloadData::DiskCache(entry), ImageFrom::DiskCache);
        }
    }
    if request.request_level() == RequestLevel::Local {
        request.cancel_at_level_gate();
        return Next::Done;
    }

    if !request.advance(Status::Connecting) {
        return Next::Done;
    }
    let response = match ctx.downloader.open(request.uri()).await {
        Ok(response) => response,
        Err(e) => {
            warn!(id = request.id(), uri = %request.uri(), error = %e, "Download failed");
            request.fail(ErrorCause::DownloadError);
            return Next::Done;
        }
    };
    if !request.advance(Status::ReadData) {
        return Next::Done;
    }

    let total = response.content_length;
    let fits_disk = total.is_none_or(|len| len <= ctx.disk_cache.max_size());
    let mut editor = if policy.is_writable() && fits_disk && !ctx.disk_cache.is_disabled() {
        match ctx.disk_cache.edit(key).await {
            Ok(editor) => Some(editor),
            Err(e) => {
                debug!(key = %key, error = %e, "Disk cache not writable, keeping bytes in memory");
                None
            }
        }
    } else {
        None
    };
    let mut buffer = BytesMut::new();
    let mut completed: u64 = 0;
    let mut body = response.body;

    while let Some(chunk) = body.next().await {
        if request.is_finished() {
            debug!(id = request.id(), completed, "Download abandoned");
            return Next::Done;
        }
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(id = request.id(), uri = %request.uri(), error = %e, "Download interrupted");
                request.fail(ErrorCause::DownloadError);
                return Next::Done;
            }
        };
        completed += chunk.len() as u64;
        match editor.take() {
            Some(mut writer) => {
                if let Err(e) = writer.write(&chunk).await {
                    warn!(key = %key, error = %e, "Disk cache write failed");
                    request.fail(ErrorCause::DiskCacheWriteFailed);
                    return Next::Done;
                }
                if writer.written() > ctx.disk_cache.max_size() {
                    debug!(key = %key, completed, "Body outgrew the disk cache, keeping bytes in memory");
                    match writer.into_bytes().await {
                        Ok(bytes) => buffer.extend_from_slice(&bytes),
                        Err(e) => {
                            warn!(key = %key, error = %e, "Disk cache read back failed");
                            request.fail(ErrorCause::DiskCacheWriteFailed);
                            return Next::Done;
                        }
                    }
                } else {
                    editor = Some(writer);
                }
            }
            None => buffer.extend_from_slice(&chunk),
        }
        request.notify_progress(total, completed);
    }

    if request.is_finished() {
        return Next::Done;
    }
    if total.is_some_and(|total| completed < total) {
        warn!(id = request.id(), completed, total, "Download truncated");
        request.fail(ErrorCause::DownloadError);
        return Next::Done;
    }

    let data = match editor {
        Some(editor) => match editor.commit().await {
            Ok(entry) => DownloadData::DiskCache(entry),
            Err(e) => {
                warn!(key = %key, error = %e, "Disk cache commit failed");
                request.fail(ErrorCause::DiskCacheWriteFailed);
                return Next::Done;
            }
        },
        None => DownloadData::Bytes(buffer.freeze()),
    };
    debug!(id = request.id(), uri = %request.uri(), bytes = completed, "Downloaded");

    request.release_download_share(ShareOutcome::Completed);
    after_download(request, data, ImageFrom::Network)
}

/// Decode and processing.
async fn load(request: &Arc<Request>, source: DataSource) -> Next {
    if !request.advance(Status::StartLoad) {
        return Next::Done;
    }
    let ctx = request.ctx();
    let Some(options) = request.options().load().cloned() else {
        request.fail(ErrorCause::DecodeFailed);
        return Next::Done;
    };
    let is_display = request.kind() == RequestKind::Display;
    let memory_policy = request.options().memory_cache_policy();

    if is_display {
        request.advance(Status::CheckMemoryCache);
        if memory_policy.is_readable() {
            if let Some(image) = ctx.memory_cache.get(request.memory_cache_key()) {
                request.complete_image(image, ImageFrom::MemoryCache);
                return Next::Done;
            }
        }
    }

    let bytes = match source.read().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(id = request.id(), error = %e, "Data source unreadable");
            request.fail(ErrorCause::DataSourceUnavailable);
            return Next::Done;
        }
    };

    if !request.advance(Status::Decoding) {
        return Next::Done;
    }
    let pool: Arc<dyn BitmapProvider> = if options.bitmap_pool_disabled {
        Arc::new(NoBitmapPool)
    } else {
        ctx.bitmap_pool.clone()
    };
    let decoder = Arc::clone(&ctx.decoder);
    let decode_options = options.decode_options();
    let decode_pool = Arc::clone(&pool);
    let decoded = tokio::task::spawn_blocking(move || {
        decoder.decode(&bytes, &decode_options, decode_pool.as_ref())
    })
    .await;
    let Decoded { mut bitmap, info } = match decoded {
        Ok(Ok(decoded)) => decoded,
        Ok(Err(e)) => {
            warn!(id = request.id(), uri = %request.uri(), error = %e, "Decode failed");
            request.fail(ErrorCause::DecodeFailed);
            return Next::Done;
        }
        Err(e) => {
            error!(id = request.id(), error = %e, "Decode task failed");
            request.fail(ErrorCause::DecodeFailed);
            return Next::Done;
        }
    };

    if !request.advance(Status::Processing) {
        pool.give_back(bitmap);
        return Next::Done;
    }
    let processors = options.effective_processors();
    if !processors.is_empty() {
        let process_pool = Arc::clone(&pool);
        let processed = tokio::task::spawn_blocking(move || {
            processors.iter().try_fold(bitmap, |bitmap, processor| {
                processor.process(bitmap, process_pool.as_ref())
            })
        })
        .await;
        bitmap = match processed {
            Ok(Ok(bitmap)) => bitmap,
            Ok(Err(e)) => {
                warn!(id = request.id(), error = %e, "Processing failed");
                request.fail(ErrorCause::ProcessFailed);
                return Next::Done;
            }
            Err(e) => {
                error!(id = request.id(), error = %e, "Processing task failed");
                request.fail(ErrorCause::ProcessFailed);
                return Next::Done;
            }
        };
    }

    if request.is_finished() {
        pool.give_back(bitmap);
        return Next::Done;
    }

    let image = Arc::new(CachedImage::new(request.memory_cache_key(), bitmap, info));
    let pin = image.mark_waiting_use();
    if is_display && memory_policy.is_writable() {
        ctx.memory_cache.put(request.memory_cache_key(), Arc::clone(&image));
    }
    request.advance(Status::WaitDisplay);
    request.complete_image(image, source.image_from());
    drop(pin);
    Next::Done
}

/// Provider used when a request opts out of buffer reuse.
struct NoBitmapPool;

impl BitmapProvider for NoBitmapPool {
    fn take(&self, _width: u32, _height: u32, _format: PixelFormat) -> Option<Bitmap> {
        None
    }

    fn give_back(&self, _bitmap: Bitmap) -> bool {
        false
    }
}
