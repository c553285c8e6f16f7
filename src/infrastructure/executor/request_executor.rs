//! Phase scheduler: one dispatch lane plus lazily created download and load
//! pools.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use super::worker_pool::{Job, PoolConfig, WorkerPool, panic_message};

/// Executor sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Download pool workers.
    pub download_workers: usize,
    /// Load pool workers.
    pub load_workers: usize,
    /// Queue capacity of each pool.
    pub queue_capacity: usize,
    /// Seconds before an idle pool worker exits.
    pub idle_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            download_workers: 3,
            load_workers: 3,
            queue_capacity: 200,
            idle_timeout_secs: 60,
        }
    }
}

impl ExecutorConfig {
    fn pool(&self, workers: usize) -> PoolConfig {
        PoolConfig {
            workers: workers.max(1),
            queue_capacity: self.queue_capacity.max(1),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

/// Schedules request phases without blocking the submitter.
pub struct RequestExecutor {
    config: ExecutorConfig,
    handle: Handle,
    dispatch_tx: Mutex<Option<mpsc::UnboundedSender<BoxFuture<'static, ()>>>>,
    download: OnceLock<WorkerPool>,
    load: OnceLock<WorkerPool>,
    shut_down: AtomicBool,
}

impl RequestExecutor {
    /// Starts the dispatch lane on `handle`. Pools are created on first use.
    #[must_use]
    pub fn new(config: ExecutorConfig, handle: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run_dispatch_lane(rx));
        debug!(?config, "Started request executor");
        Self {
            config,
            handle,
            dispatch_tx: Mutex::new(Some(tx)),
            download: OnceLock::new(),
            load: OnceLock::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Runtime the executor spawns onto.
    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Queues cheap decision work on the single FIFO lane.
    pub fn submit_dispatch(&self, work: impl Future<Output = ()> + Send + 'static) -> bool {
        let guard = self.dispatch_tx.lock();
        let Some(tx) = guard.as_ref() else {
            trace!("Executor shut down, dropping dispatch work");
            return false;
        };
        tx.send(Box::pin(work)).is_ok()
    }

    /// Queues network and disk I/O work.
    pub fn submit_download(&self, job: Job) -> bool {
        if self.is_shutdown() {
            return false;
        }
        self.download_pool().submit(job)
    }

    /// Queues decode and processing work.
    pub fn submit_load(&self, job: Job) -> bool {
        if self.is_shutdown() {
            return false;
        }
        self.load_pool().submit(job)
    }

    fn download_pool(&self) -> &WorkerPool {
        self.download.get_or_init(|| {
            WorkerPool::new(
                "download",
                self.config.pool(self.config.download_workers),
                self.handle.clone(),
            )
        })
    }

    fn load_pool(&self) -> &WorkerPool {
        self.load.get_or_init(|| {
            WorkerPool::new(
                "load",
                self.config.pool(self.config.load_workers),
                self.handle.clone(),
            )
        })
    }

    /// Stops accepting work and tears down the lane and pools. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.dispatch_tx.lock().take();
        if let Some(pool) = self.download.get() {
            pool.shutdown();
        }
        if let Some(pool) = self.load.get() {
            pool.shutdown();
        }
        debug!("Request executor shut down");
    }

    /// Returns true once [`RequestExecutor::shutdown`] ran.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Returns true if the download pool has been created.
    #[must_use]
    pub fn has_download_pool(&self) -> bool {
        self.download.get().is_some()
    }

    /// Returns true if the load pool has been created.
    #[must_use]
    pub fn has_load_pool(&self) -> bool {
        self.load.get().is_some()
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("config", &self.config)
            .field("shut_down", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

impl Drop for RequestExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_dispatch_lane(mut rx: mpsc::UnboundedReceiver<BoxFuture<'static, ()>>) {
    while let Some(work) = rx.recv().await {
        if let Err(panic_info) = std::panic::AssertUnwindSafe(work).catch_unwind().await {
            error!(panic = %panic_message(&*panic_info), "Dispatch work panicked");
        }
    }
    trace!("Dispatch lane stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    fn executor() -> RequestExecutor {
        RequestExecutor::new(ExecutorConfig::default(), Handle::current())
    }

    #[tokio::test]
    async fn test_dispatch_lane_is_fifo() {
        let executor = executor();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let seen = Arc::clone(&seen);
            executor.submit_dispatch(async move {
                tokio::task::yield_now().await;
                seen.lock().push(i);
            });
        }
        let (tx, rx) = oneshot::channel();
        executor.submit_dispatch(async move {
            let _ = tx.send(());
        });
        rx.await.unwrap();
        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_pools_created_lazily() {
        let executor = executor();
        assert!(!executor.has_download_pool());
        assert!(!executor.has_load_pool());

        let (tx, rx) = oneshot::channel();
        assert!(executor.submit_load(Job::new(async move {
            let _ = tx.send(());
        })));
        rx.await.unwrap();

        assert!(executor.has_load_pool());
        assert!(!executor.has_download_pool());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_rejects_work() {
        let executor = executor();
        executor.shutdown();
        executor.shutdown();

        assert!(executor.is_shutdown());
        assert!(!executor.submit_dispatch(async {}));
        assert!(!executor.submit_download(Job::new(async {})));
        assert!(!executor.submit_load(Job::new(async {})));
        assert!(!executor.has_download_pool());
    }
}
