//! Port definition for request callbacks.

use crate::domain::entities::{CancelCause, ErrorCause, RequestResult};

/// Receives the lifecycle callbacks of one request.
///
/// Asynchronous requests deliver every callback on the engine's callback task,
/// so implementations never race with themselves. Exactly one of
/// `on_completed`, `on_error` or `on_canceled` is called per request.
pub trait RequestListener: Send + Sync {
    /// The request was accepted and is about to be dispatched.
    fn on_started(&self) {}

    /// The request finished with a result.
    fn on_completed(&self, result: RequestResult);

    /// The request failed.
    fn on_error(&self, cause: ErrorCause);

    /// The request was canceled.
    fn on_canceled(&self, cause: CancelCause);

    /// Download progress. `total` is unknown when the server omitted it.
    fn on_progress(&self, _total: Option<u64>, _completed: u64) {}
}
