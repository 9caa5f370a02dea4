//! Exclusive lock with a FIFO wait queue and direct hand-off.
//!
//! [`RawMutex`] is the bare lock state: a held flag plus the ordered queue of
//! suspended acquirers. On release the lock goes straight to the oldest
//! waiter and the held flag stays set, so a third party can never slip in
//! between. [`Mutex`] layers data ownership and RAII guards on top of it.

use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::SyncError;
use crate::waiter::{Ticket, WaitQueue};

#[derive(Debug)]
struct LockState {
    locked: bool,
    waiters: WaitQueue,
}

/// Lock state without protected data.
///
/// `acquire` and `release` are not tied together by a guard, so releasing
/// a lock that is not held is reported as [`SyncError::LockMisuse`].
#[derive(Debug)]
pub struct RawMutex {
    state: parking_lot::Mutex<LockState>,
}

impl RawMutex {
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(LockState {
                locked: false,
                waiters: WaitQueue::new(),
            }),
        }
    }

    /// Acquire the lock, suspending behind earlier waiters if it is held.
    pub async fn acquire(&self) {
        let rx = {
            let mut state = self.state.lock();
            if !state.locked {
                state.locked = true;
                return;
            }
            state.waiters.enqueue()
        };
        Ticket::new(rx, || self.unlock()).granted().await;
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.locked {
            false
        } else {
            state.locked = true;
            true
        }
    }

    /// Release the lock, handing it to the oldest waiter if there is one.
    pub fn release(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        if !state.locked {
            return Err(SyncError::LockMisuse("release of a mutex that is not held"));
        }
        if !state.waiters.grant_next() {
            state.locked = false;
        }
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Number of callers currently suspended in `acquire`.
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Release path for callers that provably hold the lock (guards, tickets).
    pub(crate) fn unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.locked, "unlock of a mutex that is not held");
        if !state.waiters.grant_next() {
            state.locked = false;
        }
    }

    /// Queue a waiter created elsewhere, granting it at once if the lock is free.
    pub(crate) fn enqueue_waiter(&self, waiter: oneshot::Sender<()>) {
        let mut state = self.state.lock();
        if state.locked {
            state.waiters.push_back(waiter);
        } else if waiter.send(()).is_ok() {
            state.locked = true;
        }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// An async mutual-exclusion lock protecting a value of type `T`.
///
/// Waiters are served strictly in arrival order. The protected value is only
/// reachable through a [`MutexGuard`], which releases the lock when dropped,
/// including while unwinding from a panic.
pub struct Mutex<T> {
    raw: Arc<RawMutex>,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `raw`; only the single guard
// holder ever dereferences the cell.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            raw: Arc::new(RawMutex::new()),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, suspending until it is handed to this caller.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.raw.acquire().await;
        MutexGuard::new(self)
    }

    /// Acquire the lock without suspending, if it is free.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.raw.try_acquire().then(|| MutexGuard::new(self))
    }

    /// Acquire the lock through a shared handle; the guard owns the handle.
    pub async fn lock_owned(self: Arc<Self>) -> OwnedMutexGuard<T> {
        self.raw.acquire().await;
        OwnedMutexGuard {
            mutex: self,
            _not_sync: PhantomData,
        }
    }

    /// Run `f` with exclusive access to the value.
    pub async fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock().await;
        f(&mut *guard)
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// Mutable access without locking; the borrow checker proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub(crate) fn raw(&self) -> &Arc<RawMutex> {
        &self.raw
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.raw.is_locked())
            .field("waiters", &self.raw.waiters())
            .finish_non_exhaustive()
    }
}

/// Scoped ownership of a [`Mutex`]; the lock is released on drop.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
    _not_sync: PhantomData<Cell<()>>,
}

// SAFETY: sharing the guard only hands out `&T`.
unsafe impl<T: Send + Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T> MutexGuard<'a, T> {
    pub(crate) fn new(mutex: &'a Mutex<T>) -> Self {
        Self {
            mutex,
            _not_sync: PhantomData,
        }
    }

    pub(crate) fn mutex(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held by us.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held by us.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.raw.unlock();
    }
}

impl<T: fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Guard returned by [`Mutex::lock_owned`]; can be moved into spawned tasks.
pub struct OwnedMutexGuard<T> {
    mutex: Arc<Mutex<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

// SAFETY: sharing the guard only hands out `&T`.
unsafe impl<T: Send + Sync> Sync for OwnedMutexGuard<T> {}

impl<T> Deref for OwnedMutexGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held by us.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for OwnedMutexGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held by us.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for OwnedMutexGuard<T> {
    fn drop(&mut self) {
        self.mutex.raw.unlock();
    }
}

impl<T: fmt::Debug> fmt::Debug for OwnedMutexGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
