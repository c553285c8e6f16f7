//! A single request and the handle callers hold on to.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::domain::entities::{
    CachedImage, CancelCause, ErrorCause, ImageFrom, ImageResult, Outcome, RequestKind,
    RequestLevel, RequestResult, Status, WaitingUse,
};
use crate::domain::ports::{RequestListener, UriModel};
use crate::infrastructure::share::{ShareOutcome, ShareParticipant};

use super::context::EngineContext;
use super::options::RequestOptions;
use super::pipeline;
use super::state::StateCell;

/// Everything needed to create a [`Request`].
pub(crate) struct RequestSpec {
    pub uri: String,
    pub model: Option<Arc<dyn UriModel>>,
    pub options: RequestOptions,
    pub level_cancel_cause: CancelCause,
    pub sync: bool,
    pub listener: Option<Arc<dyn RequestListener>>,
}

/// One in-flight request.
///
/// Only the phase currently owning the request advances its status; any
/// thread may finish it, and the first to do so delivers the callback.
pub struct Request {
    id: u64,
    uri: String,
    model: Option<Arc<dyn UriModel>>,
    options: RequestOptions,
    key: String,
    memory_cache_key: String,
    disk_cache_key: String,
    level_cancel_cause: CancelCause,
    sync: bool,
    listener: Option<Arc<dyn RequestListener>>,
    state: StateCell,
    ctx: Arc<EngineContext>,
    download_shareable: bool,
    display_shareable: bool,
    share_disabled: AtomicBool,
    download_leader: AtomicBool,
    display_leader: AtomicBool,
}

impl Request {
    pub(crate) fn new(ctx: Arc<EngineContext>, spec: RequestSpec) -> Arc<Self> {
        let RequestSpec {
            uri,
            model,
            options,
            level_cancel_cause,
            sync,
            listener,
        } = spec;

        let key = options.request_key(&uri);
        let memory_cache_key = options.memory_cache_key(&uri);
        let disk_cache_key = model
            .as_ref()
            .map_or_else(|| uri.clone(), |model| model.disk_cache_key(&uri));
        let is_network = model.as_ref().is_some_and(|model| model.is_network());
        let download_shareable =
            !sync && is_network && options.download().disk_cache_policy.is_read_write();
        let display_shareable = !sync
            && options.kind() == RequestKind::Display
            && options.memory_cache_policy().is_read_write();

        Arc::new(Self {
            id: ctx.next_request_id(),
            uri,
            model,
            options,
            key,
            memory_cache_key,
            disk_cache_key,
            level_cancel_cause,
            sync,
            listener,
            state: StateCell::new(),
            ctx,
            download_shareable,
            display_shareable,
            share_disabled: AtomicBool::new(false),
            download_leader: AtomicBool::new(false),
            display_leader: AtomicBool::new(false),
        })
    }

    /// Unique id within the engine.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Request kind.
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        self.options.kind()
    }

    /// Requested URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Key covering the URI and every option.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key of the decoded result in the memory cache.
    #[must_use]
    pub fn memory_cache_key(&self) -> &str {
        &self.memory_cache_key
    }

    /// Key of the downloaded bytes in the disk cache.
    #[must_use]
    pub fn disk_cache_key(&self) -> &str {
        &self.disk_cache_key
    }

    /// Frozen options.
    #[must_use]
    pub const fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Returns true if phases run inline and callbacks are delivered inline.
    #[must_use]
    pub const fn is_sync(&self) -> bool {
        self.sync
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.state.status()
    }

    /// Returns true once the request reached a terminal status.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Every status the request passed through, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Status> {
        self.state.history()
    }

    /// Error cause, once failed.
    #[must_use]
    pub fn error_cause(&self) -> Option<ErrorCause> {
        self.state.error_cause()
    }

    /// Cancel cause, once canceled.
    #[must_use]
    pub fn cancel_cause(&self) -> Option<CancelCause> {
        self.state.cancel_cause()
    }

    pub(crate) const fn ctx(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub(crate) const fn model(&self) -> Option<&Arc<dyn UriModel>> {
        self.model.as_ref()
    }

    pub(crate) const fn request_level(&self) -> RequestLevel {
        self.options.request_level()
    }

    /// Cancels the request with the cause the level gate implies.
    pub(crate) fn cancel_at_level_gate(self: &Arc<Self>) -> bool {
        debug!(id = self.id, level = %self.request_level().as_str(), "Stopped by request level");
        self.cancel(self.level_cancel_cause)
    }

    pub(crate) fn advance(&self, status: Status) -> bool {
        let advanced = self.state.advance(status);
        if advanced {
            trace!(id = self.id, %status, "Request status");
        }
        advanced
    }

    pub(crate) fn can_share_download(&self) -> bool {
        self.download_shareable
            && !self.share_disabled.load(Ordering::Acquire)
            && !self.ctx.disk_cache.is_disabled()
    }

    pub(crate) fn can_share_display(&self) -> bool {
        self.display_shareable
            && !self.share_disabled.load(Ordering::Acquire)
            && !self.ctx.memory_cache.is_disabled()
    }

    pub(crate) fn is_download_leader(&self) -> bool {
        self.download_leader.load(Ordering::Acquire)
    }

    pub(crate) fn is_display_leader(&self) -> bool {
        self.display_leader.load(Ordering::Acquire)
    }

    pub(crate) fn set_download_leader(&self) {
        self.download_leader.store(true, Ordering::Release);
    }

    pub(crate) fn set_display_leader(&self) {
        self.display_leader.store(true, Ordering::Release);
    }

    /// Ends the download share early, as soon as the bytes are stored.
    pub(crate) fn release_download_share(&self, outcome: ShareOutcome) {
        if self.download_leader.swap(false, Ordering::AcqRel) {
            self.ctx.shares.unregister_download_provider(self, outcome);
        }
    }

    fn release_display_share(&self, outcome: ShareOutcome) {
        if self.display_leader.swap(false, Ordering::AcqRel) {
            self.ctx.shares.unregister_display_provider(self, outcome);
        }
    }

    /// Cancels the request. Returns false if it had already finished.
    pub fn cancel(self: &Arc<Self>, cause: CancelCause) -> bool {
        self.finish(Outcome::Canceled(cause), None)
    }

    pub(crate) fn fail(self: &Arc<Self>, cause: ErrorCause) -> bool {
        self.finish(Outcome::Failed(cause), None)
    }

    pub(crate) fn complete(self: &Arc<Self>, result: RequestResult) -> bool {
        self.finish(Outcome::Completed(result), None)
    }

    /// Completes with a decoded image, keeping it pinned until the callback
    /// has run.
    pub(crate) fn complete_image(self: &Arc<Self>, image: Arc<CachedImage>, from: ImageFrom) -> bool {
        let pin = image.mark_waiting_use();
        if image.is_recycled() {
            debug!(id = self.id, key = %self.memory_cache_key, "Image recycled before delivery");
            return self.fail(ErrorCause::BitmapRecycled);
        }
        let result = ImageResult { image, from };
        let result = match self.kind() {
            RequestKind::Display => RequestResult::Display(result),
            RequestKind::Load | RequestKind::Download => RequestResult::Load(result),
        };
        self.finish(Outcome::Completed(result), Some(pin))
    }

    fn finish(self: &Arc<Self>, outcome: Outcome, pin: Option<WaitingUse>) -> bool {
        if !self.state.finish(&outcome) {
            return false;
        }
        debug!(
            id = self.id,
            kind = %self.kind(),
            status = %self.status(),
            key = %self.key,
            "Request finished"
        );

        let share_outcome = match &outcome {
            Outcome::Completed(_) => ShareOutcome::Completed,
            Outcome::Failed(cause) => ShareOutcome::Failed(*cause),
            Outcome::Canceled(cause) => ShareOutcome::Canceled(*cause),
        };
        self.release_download_share(share_outcome);
        self.release_display_share(share_outcome);

        let request = Arc::clone(self);
        self.deliver(move || {
            if let Some(listener) = &request.listener {
                match outcome.clone() {
                    Outcome::Completed(result) => listener.on_completed(result),
                    Outcome::Failed(cause) => listener.on_error(cause),
                    Outcome::Canceled(cause) => listener.on_canceled(cause),
                }
            }
            request.state.publish(outcome);
            drop(pin);
        });
        true
    }

    pub(crate) fn notify_started(self: &Arc<Self>) {
        if self.listener.is_none() {
            return;
        }
        let request = Arc::clone(self);
        self.deliver(move || {
            if let Some(listener) = &request.listener {
                listener.on_started();
            }
        });
    }

    /// Reports download progress and forwards it to share followers.
    pub(crate) fn notify_progress(self: &Arc<Self>, total: Option<u64>, completed: u64) {
        if self.is_download_leader() {
            self.ctx.shares.update_download_progress(self, total, completed);
        }
        self.post_progress(total, completed);
    }

    fn post_progress(self: &Arc<Self>, total: Option<u64>, completed: u64) {
        if self.listener.is_none() || self.is_finished() {
            return;
        }
        let request = Arc::clone(self);
        self.deliver(move || {
            if let Some(listener) = &request.listener {
                listener.on_progress(total, completed);
            }
        });
    }

    fn deliver(&self, callback: impl FnOnce() + Send + 'static) {
        if self.sync {
            callback();
        } else {
            self.ctx.callbacks.post(callback);
        }
    }
}

impl ShareParticipant for Request {
    fn share_id(&self) -> u64 {
        self.id
    }

    fn download_share_key(&self) -> Option<&str> {
        self.download_shareable.then_some(self.disk_cache_key.as_str())
    }

    fn display_share_key(&self) -> Option<&str> {
        self.display_shareable.then_some(self.memory_cache_key.as_str())
    }

    fn on_share_progress(&self, total: Option<u64>, completed: u64) {
        if self.listener.is_none() || self.is_finished() {
            return;
        }
        if let Some(listener) = self.listener.clone() {
            self.deliver(move || listener.on_progress(total, completed));
        }
    }

    fn on_download_share_finished(self: Arc<Self>, outcome: ShareOutcome) {
        if self.is_finished() {
            return;
        }
        trace!(id = self.id, ?outcome, "Download share finished");
        if matches!(outcome, ShareOutcome::Failed(_)) {
            self.share_disabled.store(true, Ordering::Release);
        }
        // The dispatch lane finds the leader's disk cache entry, or starts an
        // independent download if it is gone.
        pipeline::submit_dispatch(self);
    }

    fn on_display_share_finished(self: Arc<Self>, outcome: ShareOutcome) {
        if self.is_finished() {
            return;
        }
        trace!(id = self.id, ?outcome, "Display share finished");
        if outcome == ShareOutcome::Completed {
            if let Some(image) = self.ctx.memory_cache.get(&self.memory_cache_key) {
                self.complete_image(image, ImageFrom::MemoryCache);
                return;
            }
        } else if matches!(outcome, ShareOutcome::Failed(_)) {
            self.share_disabled.store(true, Ordering::Release);
        }
        pipeline::submit_dispatch(self);
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("uri", &self.uri)
            .field("key", &self.key)
            .field("status", &self.status())
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

/// Caller-side handle to a submitted request.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    request: Arc<Request>,
}

impl RequestHandle {
    pub(crate) const fn new(request: Arc<Request>) -> Self {
        Self { request }
    }

    /// The underlying request.
    #[must_use]
    pub const fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Unique id within the engine.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.request.id()
    }

    /// Key covering the URI and every option.
    #[must_use]
    pub fn key(&self) -> &str {
        self.request.key()
    }

    /// Key of the decoded result in the memory cache.
    #[must_use]
    pub fn memory_cache_key(&self) -> &str {
        self.request.memory_cache_key()
    }

    /// Key of the downloaded bytes in the disk cache.
    #[must_use]
    pub fn disk_cache_key(&self) -> &str {
        self.request.disk_cache_key()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.request.status()
    }

    /// Returns true once the request reached a terminal status.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.request.is_finished()
    }

    /// Every status the request passed through, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Status> {
        self.request.history()
    }

    /// Cancels with [`CancelCause::Normal`]. Returns false if the request had
    /// already finished; calling it again has no further effect.
    pub fn cancel(&self) -> bool {
        self.request.cancel(CancelCause::Normal)
    }

    /// Cancels with an explicit cause.
    pub fn cancel_with(&self, cause: CancelCause) -> bool {
        self.request.cancel(cause)
    }

    /// The outcome, once its callback has been delivered.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.request.state.delivered()
    }

    /// Waits until the request finished and its callback has been delivered.
    pub async fn wait(&self) -> Outcome {
        let mut receiver = self.request.state.subscribe();
        let delivered = receiver
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone());
        delivered.unwrap_or(Outcome::Canceled(CancelCause::Normal))
    }
}
