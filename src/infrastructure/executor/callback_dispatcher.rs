//! Single consumer task that runs listener callbacks in submission order.

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::worker_pool::panic_message;

/// A deferred listener invocation.
pub type Callback = Box<dyn FnOnce() + Send>;

/// Delivers callbacks on one fixed task so listener code never races with
/// itself.
pub struct CallbackDispatcher {
    tx: Mutex<Option<mpsc::UnboundedSender<Callback>>>,
}

impl CallbackDispatcher {
    /// Spawns the consumer task on `handle`.
    #[must_use]
    pub fn new(handle: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run_consumer(rx));
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Queues a callback.
    ///
    /// After [`CallbackDispatcher::shutdown`] callbacks run inline so no
    /// terminal notification is lost.
    pub fn post(&self, callback: impl FnOnce() + Send + 'static) {
        let callback: Callback = Box::new(callback);
        let rejected = match self.tx.lock().as_ref() {
            Some(tx) => tx.send(callback).err().map(|e| e.0),
            None => Some(callback),
        };
        if let Some(callback) = rejected {
            run_callback(callback);
        }
    }

    /// Closes the channel; already queued callbacks still run.
    pub fn shutdown(&self) {
        if self.tx.lock().take().is_some() {
            debug!("Callback dispatcher closed");
        }
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("open", &self.tx.lock().is_some())
            .finish()
    }
}

async fn run_consumer(mut rx: mpsc::UnboundedReceiver<Callback>) {
    while let Some(callback) = rx.recv().await {
        run_callback(callback);
    }
}

fn run_callback(callback: Callback) {
    if let Err(panic_info) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        error!(panic = %panic_message(&*panic_info), "Listener callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_callbacks_run_in_order() {
        let dispatcher = CallbackDispatcher::new(&Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = oneshot::channel();

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            dispatcher.post(move || seen.lock().push(i));
        }
        dispatcher.post(move || {
            let _ = tx.send(());
        });

        rx.await.unwrap();
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_runs_inline_after_shutdown() {
        let dispatcher = CallbackDispatcher::new(&Handle::current());
        dispatcher.shutdown();

        let seen = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&seen);
        dispatcher.post(move || *flag.lock() = true);
        assert!(*seen.lock());
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_stop_consumer() {
        let dispatcher = CallbackDispatcher::new(&Handle::current());
        let (tx, rx) = oneshot::channel();
        dispatcher.post(|| panic!("listener bug"));
        dispatcher.post(move || {
            let _ = tx.send(());
        });
        rx.await.unwrap();
    }
}
