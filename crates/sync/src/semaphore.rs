//! Counting semaphore with FIFO hand-off.
//!
//! `available + held == capacity` holds at every instant: a released permit
//! either goes straight to the oldest waiter or back to the counter, never
//! both.

use std::sync::Arc;

use crate::waiter::{Ticket, WaitQueue};

#[derive(Debug)]
struct SemaphoreState {
    permits: usize,
    waiters: WaitQueue,
}

#[derive(Debug)]
pub struct Semaphore {
    capacity: usize,
    state: parking_lot::Mutex<SemaphoreState>,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            capacity: permits,
            state: parking_lot::Mutex::new(SemaphoreState {
                permits,
                waiters: WaitQueue::new(),
            }),
        }
    }

    /// Take a permit, suspending behind earlier waiters when none is free.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.acquire_inner().await;
        SemaphorePermit { semaphore: self }
    }

    /// Like [`acquire`](Self::acquire), but the permit keeps the semaphore alive.
    pub async fn acquire_owned(self: Arc<Self>) -> OwnedSemaphorePermit {
        self.acquire_inner().await;
        OwnedSemaphorePermit { semaphore: self }
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            Some(SemaphorePermit { semaphore: self })
        } else {
            None
        }
    }

    /// Permits currently free. Diagnostic only: stale as soon as it returns.
    pub fn available_permits(&self) -> usize {
        self.state.lock().permits
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of callers currently suspended in `acquire`.
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    async fn acquire_inner(&self) {
        let rx = {
            let mut state = self.state.lock();
            if state.permits > 0 {
                state.permits -= 1;
                return;
            }
            state.waiters.enqueue()
        };
        Ticket::new(rx, || self.release_permit()).granted().await;
    }

    fn release_permit(&self) {
        let mut state = self.state.lock();
        if !state.waiters.grant_next() {
            state.permits += 1;
        }
    }
}

/// A held permit; returned to the semaphore on drop.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl SemaphorePermit<'_> {
    /// Return the permit explicitly.
    pub fn release(self) {}
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release_permit();
    }
}

/// A held permit that owns a handle to its semaphore.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct OwnedSemaphorePermit {
    semaphore: Arc<Semaphore>,
}

impl OwnedSemaphorePermit {
    pub fn release(self) {}
}

impl Drop for OwnedSemaphorePermit {
    fn drop(&mut self) {
        self.semaphore.release_permit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn permits_are_counted() {
        let sem = Semaphore::new(2);
        let a = sem.acquire().await;
        assert_eq!(sem.available_permits(), 1);
        let b = sem.try_acquire().expect("second permit");
        assert_eq!(sem.available_permits(), 0);
        assert!(sem.try_acquire().is_none());

        a.release();
        assert_eq!(sem.available_permits(), 1);
        drop(b);
        assert_eq!(sem.available_permits(), 2);
        assert_eq!(sem.capacity(), 2);
    }

    #[tokio::test]
    async fn release_transfers_directly_to_waiter() {
        let sem = Arc::new(Semaphore::new(1));
        let held = sem.clone().acquire_owned().await;

        let waiter = tokio::spawn(sem.clone().acquire_owned());
        while sem.waiters() == 0 {
            tokio::task::yield_now().await;
        }

        drop(held);
        // The permit went to the waiter, not back to the counter.
        assert_eq!(sem.available_permits(), 0);
        let permit = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be granted")
            .unwrap();
        drop(permit);
        assert_eq!(sem.available_permits(), 1);
    }

    #[tokio::test]
    async fn abandoned_waiter_returns_permit() {
        let sem = Semaphore::new(1);
        let held = sem.acquire().await;
        let gave_up = tokio::time::timeout(Duration::from_millis(20), sem.acquire()).await;
        assert!(gave_up.is_err());

        drop(held);
        assert_eq!(sem.available_permits(), 1);
    }
}
