//! Supervised pool of evaluation worker threads.
//!
//! Work is handed to a fixed set of OS threads over message channels and
//! each submission is correlated with its result by a unique task id.
//! A worker whose handler panics is replaced in its slot; only the task it
//! was running is failed.

pub mod error;
pub mod pool;
pub mod worker;

pub use error::PoolError;
pub use pool::{PoolStats, WorkerPool};
pub use worker::{TaskHandler, WorkerCommand, WorkerEvent};
