//! Scheduling of request phases and listener callbacks.

pub mod callback_dispatcher;
pub mod request_executor;
pub mod worker_pool;

pub use callback_dispatcher::{Callback, CallbackDispatcher};
pub use request_executor::{ExecutorConfig, RequestExecutor};
pub use worker_pool::{Job, PoolConfig, WorkerPool};
