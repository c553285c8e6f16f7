//! Status cell shared by the phases of one request.

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::entities::{CancelCause, ErrorCause, Outcome, Status};

#[derive(Debug)]
struct Inner {
    status: Status,
    error_cause: Option<ErrorCause>,
    cancel_cause: Option<CancelCause>,
    history: Vec<Status>,
}

impl Inner {
    fn set_status(&mut self, status: Status) {
        if self.status != status {
            self.status = status;
            self.history.push(status);
        }
    }
}

impl Default for Inner {
    fn default() -> Self {
        let status = Status::default();
        Self {
            status,
            error_cause: None,
            cancel_cause: None,
            history: vec![status],
        }
    }
}

/// Status plus terminal cause. Terminal states are absorbing.
#[derive(Debug)]
pub(crate) struct StateCell {
    inner: Mutex<Inner>,
    delivered: watch::Sender<Option<Outcome>>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            delivered: watch::Sender::new(None),
        }
    }

    pub(crate) fn status(&self) -> Status {
        self.inner.lock().status
    }

    pub(crate) fn error_cause(&self) -> Option<ErrorCause> {
        self.inner.lock().error_cause
    }

    pub(crate) fn cancel_cause(&self) -> Option<CancelCause> {
        self.inner.lock().cancel_cause
    }

    /// Every status passed through, oldest first.
    pub(crate) fn history(&self) -> Vec<Status> {
        self.inner.lock().history.clone()
    }

    /// Moves to a non-terminal status. Returns false if already finished.
    pub(crate) fn advance(&self, status: Status) -> bool {
        debug_assert!(!status.is_finished());
        let mut inner = self.inner.lock();
        if inner.status.is_finished() {
            return false;
        }
        inner.set_status(status);
        true
    }

    /// Moves to the terminal status matching `outcome`. Only the first caller
    /// wins; everyone else gets false.
    pub(crate) fn finish(&self, outcome: &Outcome) -> bool {
        let mut inner = self.inner.lock();
        if inner.status.is_finished() {
            return false;
        }
        match outcome {
            Outcome::Completed(_) => inner.set_status(Status::Completed),
            Outcome::Failed(cause) => {
                inner.set_status(Status::Failed);
                inner.error_cause = Some(*cause);
            }
            Outcome::Canceled(cause) => {
                inner.set_status(Status::Canceled);
                inner.cancel_cause = Some(*cause);
            }
        }
        true
    }

    /// Publishes the outcome once its callback has run.
    pub(crate) fn publish(&self, outcome: Outcome) {
        self.delivered.send_replace(Some(outcome));
    }

    pub(crate) fn delivered(&self) -> Option<Outcome> {
        self.delivered.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Outcome>> {
        self.delivered.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_state_is_absorbing() {
        let state = StateCell::new();
        assert!(state.advance(Status::StartDispatch));
        assert!(state.finish(&Outcome::Canceled(CancelCause::Normal)));

        assert!(!state.finish(&Outcome::Failed(ErrorCause::DecodeFailed)));
        assert!(!state.advance(Status::Decoding));
        assert_eq!(state.status(), Status::Canceled);
        assert_eq!(state.cancel_cause(), Some(CancelCause::Normal));
        assert_eq!(state.error_cause(), None);
    }

    #[test]
    fn test_history_records_each_change_once() {
        let state = StateCell::new();
        assert!(state.advance(Status::WaitDispatch));
        assert!(state.advance(Status::StartDispatch));
        assert!(state.finish(&Outcome::Failed(ErrorCause::UriNoSupport)));
        assert!(!state.advance(Status::Decoding));

        assert_eq!(
            state.history(),
            vec![Status::WaitDispatch, Status::StartDispatch, Status::Failed]
        );
    }

    #[test]
    fn test_publish_reaches_subscribers() {
        let state = StateCell::new();
        let receiver = state.subscribe();
        assert!(receiver.borrow().is_none());

        state.publish(Outcome::Failed(ErrorCause::UriInvalid));
        assert!(matches!(
            *receiver.borrow(),
            Some(Outcome::Failed(ErrorCause::UriInvalid))
        ));
        assert!(state.delivered().is_some());
    }
}
