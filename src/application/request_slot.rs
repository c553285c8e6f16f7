//! Caller-owned holder of the latest display request for one target.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::domain::entities::CancelCause;
use crate::infrastructure::request::RequestHandle;

/// Remembers the live display request of one consumer, e.g. one image view.
///
/// Committing into a slot whose live request has the same key merges with it;
/// any other live request is canceled with [`CancelCause::BeReplaced`].
#[derive(Debug, Clone, Default)]
pub struct RequestSlot {
    current: Arc<Mutex<Option<(String, RequestHandle)>>>,
}

impl RequestSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The request currently held, finished or not.
    #[must_use]
    pub fn current(&self) -> Option<RequestHandle> {
        self.current.lock().as_ref().map(|(_, handle)| handle.clone())
    }

    /// Cancels the live request, if any, and empties the slot.
    pub fn clear(&self) -> bool {
        self.current
            .lock()
            .take()
            .is_some_and(|(_, handle)| handle.cancel())
    }

    /// Swaps in the request `create` builds unless a live request committed
    /// with `key` is already held. Keys are compared before any pause
    /// adjustment, so a lowered request still merges with its resubmission.
    pub(crate) fn replace_with(
        &self,
        key: &str,
        create: impl FnOnce() -> RequestHandle,
    ) -> (RequestHandle, bool) {
        let mut current = self.current.lock();
        if let Some((existing_key, existing)) = current.as_ref() {
            if !existing.is_finished() {
                if existing_key == key {
                    debug!(id = existing.id(), key, "Merged with live request");
                    return (existing.clone(), false);
                }
                existing.cancel_with(CancelCause::BeReplaced);
            }
        }
        let handle = create();
        *current = Some((key.to_string(), handle.clone()));
        (handle, true)
    }
}
