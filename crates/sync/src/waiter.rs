use std::collections::VecDeque;

use tokio::sync::oneshot;

/// Identifies one entry of a [`WaitQueue`] for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaiterId(u64);

/// FIFO queue of suspended callers, each waiting for a single grant.
#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    waiters: VecDeque<(WaiterId, oneshot::Sender<()>)>,
    next_id: u64,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a new waiter and return the receiving end of its grant.
    pub(crate) fn enqueue(&mut self) -> oneshot::Receiver<()> {
        self.enqueue_tracked().1
    }

    /// Like [`enqueue`](Self::enqueue), also returning the entry's id.
    pub(crate) fn enqueue_tracked(&mut self) -> (WaiterId, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let id = self.push_back(tx);
        (id, rx)
    }

    /// Append a waiter created elsewhere (a signalled condition waiter).
    pub(crate) fn push_back(&mut self, waiter: oneshot::Sender<()>) -> WaiterId {
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        self.waiters.push_back((id, waiter));
        id
    }

    /// Drop the entry `id`. Returns `false` if it already left the queue.
    pub(crate) fn remove(&mut self, id: WaiterId) -> bool {
        match self.waiters.iter().position(|(entry, _)| *entry == id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Hand the grant to the oldest waiter that is still listening.
    ///
    /// Returns `false` when no live waiter remains.
    pub(crate) fn grant_next(&mut self) -> bool {
        while let Some((_, waiter)) = self.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                return true;
            }
        }
        false
    }

    /// Remove the oldest live waiter without granting it.
    pub(crate) fn pop_live(&mut self) -> Option<oneshot::Sender<()>> {
        while let Some((_, waiter)) = self.waiters.pop_front() {
            if !waiter.is_closed() {
                return Some(waiter);
            }
        }
        None
    }

    /// Remove every live waiter, oldest first.
    pub(crate) fn drain_live(&mut self) -> Vec<oneshot::Sender<()>> {
        self.waiters
            .drain(..)
            .map(|(_, waiter)| waiter)
            .filter(|waiter| !waiter.is_closed())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters
            .iter()
            .filter(|(_, waiter)| !waiter.is_closed())
            .count()
    }
}

/// A caller's place in a [`WaitQueue`].
///
/// If the caller stops waiting (its future is dropped) after the grant was
/// already sent, `on_abandon` runs so the grant is passed on instead of leaked.
/// If it stops before any grant arrived, the optional `on_cancel` runs.
pub(crate) struct Ticket<F: FnOnce(), G: FnOnce() = fn()> {
    rx: Option<oneshot::Receiver<()>>,
    on_abandon: Option<F>,
    on_cancel: Option<G>,
}

impl<F: FnOnce()> Ticket<F> {
    pub(crate) fn new(rx: oneshot::Receiver<()>, on_abandon: F) -> Self {
        Self {
            rx: Some(rx),
            on_abandon: Some(on_abandon),
            on_cancel: None,
        }
    }
}

impl<F: FnOnce(), G: FnOnce()> Ticket<F, G> {
    pub(crate) fn with_cancel(rx: oneshot::Receiver<()>, on_abandon: F, on_cancel: G) -> Self {
        Self {
            rx: Some(rx),
            on_abandon: Some(on_abandon),
            on_cancel: Some(on_cancel),
        }
    }

    /// Suspend until the grant arrives.
    pub(crate) async fn granted(mut self) {
        if let Some(rx) = self.rx.as_mut() {
            // Senders are only dropped unsent together with the primitive,
            // which outlives every borrower waiting on it.
            let _ = rx.await;
        }
        self.rx = None;
    }
}

impl<F: FnOnce(), G: FnOnce()> Drop for Ticket<F, G> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        // Closing first means no grant can land after the check below.
        rx.close();
        if rx.try_recv().is_ok() {
            if let Some(on_abandon) = self.on_abandon.take() {
                on_abandon();
            }
        } else if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}
