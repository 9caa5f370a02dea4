//! Async synchronization primitives with strict FIFO wakeup order.
//!
//! - [`Mutex`] / [`RawMutex`]: exclusive lock, handed directly to the next waiter
//! - [`Condition`]: wait set bound to exactly one [`Mutex`]
//! - [`Semaphore`]: counting permit gate
//! - [`Channel`]: bounded FIFO buffer with backpressure and close semantics
//! - [`KeyedMutexRegistry`]: lazily created per-key mutexes
//!
//! Every suspension point is an `.await`. Internal bookkeeping is guarded by
//! short `parking_lot` critical sections that are never held across an await.
//! Dropping a suspended future is safe: a grant that arrives after the caller
//! gave up is passed on to the next waiter.

pub mod channel;
pub mod condition;
pub mod error;
pub mod keyed;
pub mod mutex;
pub mod semaphore;
mod waiter;

pub use channel::Channel;
pub use condition::Condition;
pub use error::SyncError;
pub use keyed::{KeyGuard, KeyedMutexRegistry};
pub use mutex::{Mutex, MutexGuard, OwnedMutexGuard, RawMutex};
pub use semaphore::{OwnedSemaphorePermit, Semaphore, SemaphorePermit};
