//! Bounded pool of worker tasks with a discard-oldest queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, trace, warn};

/// A unit of work for a pool.
pub struct Job {
    future: BoxFuture<'static, ()>,
    on_discard: Option<Box<dyn FnOnce() + Send>>,
}

impl Job {
    /// Wraps a future.
    pub fn new(future: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            future: Box::pin(future),
            on_discard: None,
        }
    }

    /// Sets a hook that runs if the job is dropped unrun, either from a full
    /// queue or at shutdown.
    #[must_use]
    pub fn on_discard(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_discard = Some(Box::new(hook));
        self
    }

    fn discard(self) {
        if let Some(hook) = self.on_discard {
            hook();
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("has_discard_hook", &self.on_discard.is_some())
            .finish_non_exhaustive()
    }
}

/// Sizing of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum concurrent workers.
    pub workers: usize,
    /// Maximum queued jobs before the oldest is discarded.
    pub queue_capacity: usize,
    /// How long an idle worker waits before exiting.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 200,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

struct Shared {
    name: &'static str,
    config: PoolConfig,
    queue: Mutex<VecDeque<Job>>,
    notify: Notify,
    live_workers: AtomicUsize,
    idle_workers: AtomicUsize,
    closed: AtomicBool,
    discarded: AtomicU64,
}

impl Shared {
    fn pop(&self) -> Option<Job> {
        self.queue.lock().pop_front()
    }

    fn has_queued(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    /// Reserves a worker slot if below the limit.
    fn try_reserve_worker(&self) -> bool {
        self.live_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.config.workers).then_some(live + 1)
            })
            .is_ok()
    }
}

/// A fixed-role pool of tokio tasks.
///
/// Workers are spawned on demand up to the configured limit and exit after
/// sitting idle for `idle_timeout`. When the queue is full the oldest queued
/// job is dropped to admit the new one.
pub struct WorkerPool {
    shared: Arc<Shared>,
    handle: Handle,
}

impl WorkerPool {
    /// Creates a pool that spawns its workers on `handle`.
    #[must_use]
    pub fn new(name: &'static str, config: PoolConfig, handle: Handle) -> Self {
        debug!(
            pool = name,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Created worker pool"
        );
        Self {
            shared: Arc::new(Shared {
                name,
                config,
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                live_workers: AtomicUsize::new(0),
                idle_workers: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                discarded: AtomicU64::new(0),
            }),
            handle,
        }
    }

    /// Queues a job. Returns false if the pool is shut down.
    pub fn submit(&self, job: Job) -> bool {
        let shared = &self.shared;
        if shared.closed.load(Ordering::Acquire) {
            trace!(pool = shared.name, "Pool closed, dropping job");
            return false;
        }

        let dropped = {
            let mut queue = shared.queue.lock();
            let dropped = if queue.len() >= shared.config.queue_capacity.max(1) {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(job);
            dropped
        };

        if let Some(oldest) = dropped {
            let total = shared.discarded.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(pool = shared.name, discarded = total, "Queue full, discarded oldest job");
            oldest.discard();
        }

        shared.notify.notify_one();
        self.ensure_worker();
        true
    }

    fn ensure_worker(&self) {
        let shared = &self.shared;
        if shared.idle_workers.load(Ordering::Acquire) >= shared.queue.lock().len() {
            return;
        }
        if shared.try_reserve_worker() {
            trace!(pool = shared.name, "Spawning worker");
            self.handle.spawn(run_worker(Arc::clone(shared)));
        }
    }

    /// Stops accepting jobs and discards everything still queued, running
    /// their discard hooks. Running jobs finish on their own.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let pending = std::mem::take(&mut *shared.queue.lock());
        debug!(pool = shared.name, dropped = pending.len(), "Shut down worker pool");
        shared.notify.notify_waiters();
        for job in pending {
            job.discard();
        }
    }

    /// Returns true once [`WorkerPool::shutdown`] ran.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Jobs waiting for a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Workers currently alive.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::Acquire)
    }

    /// Total jobs dropped because the queue was full.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.shared.discarded.load(Ordering::Relaxed)
    }

    /// Pool name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.shared.name
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("config", &self.shared.config)
            .field("live_workers", &self.live_workers())
            .finish_non_exhaustive()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker(shared: Arc<Shared>) {
    loop {
        if let Some(job) = shared.pop() {
            run_job(&shared, job).await;
            continue;
        }
        if shared.closed.load(Ordering::Acquire) {
            break;
        }

        shared.idle_workers.fetch_add(1, Ordering::AcqRel);
        let woken = tokio::time::timeout(shared.config.idle_timeout, shared.notify.notified())
            .await
            .is_ok();
        shared.idle_workers.fetch_sub(1, Ordering::AcqRel);

        if woken || shared.closed.load(Ordering::Acquire) {
            continue;
        }

        shared.live_workers.fetch_sub(1, Ordering::AcqRel);
        // A job queued while this worker was retiring must not be stranded.
        if shared.has_queued()
            && !shared.closed.load(Ordering::Acquire)
            && shared.try_reserve_worker()
        {
            continue;
        }
        trace!(pool = shared.name, "Idle worker exiting");
        return;
    }
    shared.live_workers.fetch_sub(1, Ordering::AcqRel);
    trace!(pool = shared.name, "Worker stopped");
}

async fn run_job(shared: &Shared, job: Job) {
    if let Err(panic_info) = std::panic::AssertUnwindSafe(job.future)
        .catch_unwind()
        .await
    {
        error!(pool = shared.name, panic = %panic_message(&*panic_info), "Job panicked");
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Semaphore, oneshot};

    fn pool(workers: usize, queue_capacity: usize) -> WorkerPool {
        WorkerPool::new(
            "test",
            PoolConfig {
                workers,
                queue_capacity,
                idle_timeout: Duration::from_millis(50),
            },
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn test_runs_submitted_jobs() {
        let pool = pool(2, 10);
        let (tx, rx) = oneshot::channel();
        assert!(pool.submit(Job::new(async move {
            let _ = tx.send(42);
        })));
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_worker_limit() {
        let pool = pool(2, 10);
        let gate = Arc::new(Semaphore::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let gate = Arc::clone(&gate);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(Job::new(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                let _permit = gate.acquire().await.unwrap();
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.live_workers(), 2);
        gate.add_permits(5);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(pool.queued(), 0);
    }

    #[tokio::test]
    async fn test_discard_oldest_runs_hook() {
        let pool = pool(1, 2);
        let gate = Arc::new(Semaphore::new(0));
        let ran = Arc::new(Mutex::new(Vec::new()));
        let discarded = Arc::new(Mutex::new(Vec::new()));

        let blocker_gate = Arc::clone(&gate);
        pool.submit(Job::new(async move {
            let _permit = blocker_gate.acquire().await.unwrap();
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;

        for i in 0..4 {
            let ran = Arc::clone(&ran);
            let discarded = Arc::clone(&discarded);
            pool.submit(
                Job::new(async move { ran.lock().push(i) })
                    .on_discard(move || discarded.lock().push(i)),
            );
        }

        assert_eq!(*discarded.lock(), vec![0, 1]);
        assert_eq!(pool.discarded(), 2);

        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*ran.lock(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_idle_workers_retire_and_respawn() {
        let pool = pool(2, 10);
        let (tx, rx) = oneshot::channel();
        pool.submit(Job::new(async move {
            let _ = tx.send(());
        }));
        rx.await.unwrap();
        assert_eq!(pool.live_workers(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.live_workers(), 0);

        let (tx, rx) = oneshot::channel();
        pool.submit(Job::new(async move {
            let _ = tx.send(());
        }));
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_rejects_jobs() {
        let pool = pool(1, 10);
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(!pool.submit(Job::new(async {})));
    }

    #[tokio::test]
    async fn test_shutdown_discards_queued_jobs() {
        let pool = pool(1, 10);
        let gate = Arc::new(Semaphore::new(0));
        let blocker_gate = Arc::clone(&gate);
        pool.submit(Job::new(async move {
            let _permit = blocker_gate.acquire().await.unwrap();
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let discarded = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let discarded = Arc::clone(&discarded);
            pool.submit(Job::new(async {}).on_discard(move || {
                discarded.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();
        assert_eq!(discarded.load(Ordering::SeqCst), 3);
        gate.add_permits(1);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_kill_pool() {
        let pool = pool(1, 10);
        pool.submit(Job::new(async { panic!("boom") }));
        let (tx, rx) = oneshot::channel();
        pool.submit(Job::new(async move {
            let _ = tx.send(());
        }));
        rx.await.unwrap();
    }
}
