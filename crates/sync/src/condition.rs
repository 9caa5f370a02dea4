//! Condition variable co-designed with [`Mutex`].
//!
//! A [`Condition`] is bound to exactly one mutex at construction. `wait`
//! joins the wait set and hands the mutex on inside one critical section, so
//! a signal can never fall between the two steps. A signalled waiter is moved
//! straight into the mutex's FIFO queue and owns the lock again by the time
//! `wait` returns. A waiter cancelled after being signalled passes the
//! signal on to the next one.

use std::sync::Arc;

use crate::error::SyncError;
use crate::mutex::{Mutex, MutexGuard, RawMutex};
use crate::waiter::{Ticket, WaitQueue, WaiterId};

#[derive(Debug)]
pub struct Condition {
    raw: Arc<RawMutex>,
    waiters: parking_lot::Mutex<WaitQueue>,
}

impl Condition {
    /// Create a condition guarded by `mutex`.
    pub fn new<T>(mutex: &Mutex<T>) -> Self {
        Self {
            raw: Arc::clone(mutex.raw()),
            waiters: parking_lot::Mutex::new(WaitQueue::new()),
        }
    }

    /// Release the mutex, suspend until signalled, then re-acquire it.
    ///
    /// Fails with [`SyncError::LockMisuse`] when `guard` belongs to a mutex
    /// other than the one this condition was created with.
    pub async fn wait<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
    ) -> Result<MutexGuard<'a, T>, SyncError> {
        if !Arc::ptr_eq(guard.mutex().raw(), &self.raw) {
            return Err(SyncError::LockMisuse(
                "condition waited on with a guard of a different mutex",
            ));
        }
        Ok(self.wait_bound(guard).await)
    }

    /// Wait until `condition` returns `false`, re-checking after every wakeup.
    pub async fn wait_while<'a, T>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut condition: impl FnMut(&mut T) -> bool,
    ) -> Result<MutexGuard<'a, T>, SyncError> {
        while condition(&mut *guard) {
            guard = self.wait(guard).await?;
        }
        Ok(guard)
    }

    /// Wait with a guard already known to belong to the bound mutex.
    pub(crate) async fn wait_bound<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex = guard.mutex();
        let (id, rx) = {
            let mut waiters = self.waiters.lock();
            let entry = waiters.enqueue_tracked();
            // Handing the mutex on while the wait set is still locked closes
            // the lost-wakeup window.
            drop(guard);
            entry
        };
        Ticket::with_cancel(rx, || self.raw.unlock(), || self.forward_signal(id))
            .granted()
            .await;
        MutexGuard::new(mutex)
    }

    /// Wake the oldest waiter. Returns whether there was one.
    pub fn signal(&self) -> bool {
        let mut waiters = self.waiters.lock();
        self.wake_one(&mut waiters)
    }

    fn wake_one(&self, waiters: &mut WaitQueue) -> bool {
        match waiters.pop_live() {
            Some(waiter) => {
                self.raw.enqueue_waiter(waiter);
                true
            }
            None => false,
        }
    }

    /// Cancel path of a waiter that never got the mutex back. If it had
    /// already left the wait set, a signal was spent on it.
    fn forward_signal(&self, id: WaiterId) {
        let mut waiters = self.waiters.lock();
        if !waiters.remove(id) {
            self.wake_one(&mut waiters);
        }
    }

    /// Wake every current waiter, in the order they started waiting.
    /// Returns how many were woken.
    pub fn broadcast(&self) -> usize {
        let mut waiters = self.waiters.lock();
        let woken = waiters.drain_live();
        let count = woken.len();
        for waiter in woken {
            self.raw.enqueue_waiter(waiter);
        }
        count
    }

    /// Number of callers currently suspended in `wait`.
    pub fn waiters(&self) -> usize {
        self.waiters.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_with_foreign_guard_is_misuse() {
        let a = Mutex::new(());
        let b = Mutex::new(());
        let cond = Condition::new(&a);

        let guard = b.lock().await;
        assert!(matches!(
            cond.wait(guard).await,
            Err(SyncError::LockMisuse(_))
        ));
        // The foreign guard was dropped, so `b` is free again.
        assert!(!b.is_locked());
    }

    #[tokio::test]
    async fn signal_without_waiters_is_noop() {
        let mutex = Mutex::new(());
        let cond = Condition::new(&mutex);
        assert!(!cond.signal());
        assert_eq!(cond.broadcast(), 0);
    }

    #[tokio::test]
    async fn waiter_reacquires_mutex_after_signal() {
        let mutex = Arc::new(Mutex::new(false));
        let cond = Arc::new(Condition::new(&mutex));

        let waiter = {
            let mutex = mutex.clone();
            let cond = cond.clone();
            tokio::spawn(async move {
                let guard = mutex.lock().await;
                let guard = cond.wait_while(guard, |ready| !*ready).await.unwrap();
                assert!(*guard);
                assert!(mutex.is_locked());
            })
        };

        while cond.waiters() == 0 {
            tokio::task::yield_now().await;
        }
        // The waiter released the mutex while suspended.
        assert!(!mutex.is_locked());

        {
            let mut ready = mutex.lock().await;
            *ready = true;
            assert!(cond.signal());
        }

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(!mutex.is_locked());
    }

    #[tokio::test]
    async fn broadcast_wakes_all_in_order() {
        let mutex = Arc::new(Mutex::new(Vec::new()));
        let cond = Arc::new(Condition::new(&mutex));

        let mut handles = Vec::new();
        for i in 0..3 {
            let mutex = mutex.clone();
            let task_cond = cond.clone();
            handles.push(tokio::spawn(async move {
                let guard = mutex.lock().await;
                let mut guard = task_cond.wait(guard).await.unwrap();
                guard.push(i);
            }));
            while cond.waiters() < i + 1 {
                tokio::task::yield_now().await;
            }
        }

        assert_eq!(cond.broadcast(), 3);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*mutex.lock().await, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn cancelled_signalled_waiter_passes_signal_on() {
        let mutex = Arc::new(Mutex::new(0u32));
        let cond = Arc::new(Condition::new(&mutex));

        let spawn_waiter = || {
            let mutex = mutex.clone();
            let cond = cond.clone();
            tokio::spawn(async move {
                let guard = mutex.lock().await;
                let mut guard = cond.wait(guard).await.unwrap();
                *guard += 1;
            })
        };
        let first = spawn_waiter();
        while cond.waiters() < 1 {
            tokio::task::yield_now().await;
        }
        let second = spawn_waiter();
        while cond.waiters() < 2 {
            tokio::task::yield_now().await;
        }

        {
            let _held = mutex.lock().await;
            assert!(cond.signal());
            // Signalled but still queued behind `_held` when it gives up.
            first.abort();
            assert!(first.await.unwrap_err().is_cancelled());
        }

        tokio::time::timeout(Duration::from_secs(1), second)
            .await
            .expect("signal should reach the second waiter")
            .unwrap();
        assert_eq!(*mutex.lock().await, 1);
        assert_eq!(cond.waiters(), 0);
    }

    #[tokio::test]
    async fn cancelled_unsignalled_waiter_leaves_quietly() {
        let mutex = Arc::new(Mutex::new(()));
        let cond = Arc::new(Condition::new(&mutex));

        let waiter = {
            let mutex = mutex.clone();
            let cond = cond.clone();
            tokio::spawn(async move {
                let guard = mutex.lock().await;
                let _guard = cond.wait(guard).await.unwrap();
            })
        };
        while cond.waiters() < 1 {
            tokio::task::yield_now().await;
        }
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        assert_eq!(cond.waiters(), 0);
        assert!(!cond.signal());
        assert!(!mutex.is_locked());
    }
}
