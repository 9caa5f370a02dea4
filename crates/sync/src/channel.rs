//! Bounded FIFO channel with backpressure.
//!
//! Built from one [`Mutex`] and two [`Condition`]s: senders wait on
//! "not full", receivers on "not empty". Closing is permanent: blocked
//! senders fail with [`SyncError::ChannelClosed`], receivers drain what is
//! buffered and then observe end-of-stream (`None`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::Stream;
use tracing::debug;

use crate::condition::Condition;
use crate::error::SyncError;
use crate::mutex::Mutex;

struct ChannelState<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

pub struct Channel<T> {
    capacity: usize,
    state: Mutex<ChannelState<T>>,
    not_empty: Condition,
    not_full: Condition,
    // Lock-free mirrors for the diagnostic accessors.
    len: AtomicUsize,
    closed: AtomicBool,
}

impl<T> Channel<T> {
    /// Create a channel holding at most `capacity` items (minimum 1).
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let state = Mutex::new(ChannelState {
            buffer: VecDeque::with_capacity(capacity),
            closed: false,
        });
        let not_empty = Condition::new(&state);
        let not_full = Condition::new(&state);
        Self {
            capacity,
            state,
            not_empty,
            not_full,
            len: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Append an item, suspending while the buffer is full.
    pub async fn send(&self, item: T) -> Result<(), SyncError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(SyncError::ChannelClosed);
        }
        while state.buffer.len() >= self.capacity {
            state = self.not_full.wait_bound(state).await;
            if state.closed {
                return Err(SyncError::ChannelClosed);
            }
        }
        state.buffer.push_back(item);
        self.len.store(state.buffer.len(), Ordering::Relaxed);
        self.not_empty.signal();
        Ok(())
    }

    /// Take the oldest item, suspending while the buffer is empty.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub async fn receive(&self) -> Option<T> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(item) = state.buffer.pop_front() {
                self.len.store(state.buffer.len(), Ordering::Relaxed);
                self.not_full.signal();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait_bound(state).await;
        }
    }

    /// Close the channel. Idempotent.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        self.closed.store(true, Ordering::Relaxed);
        let receivers = self.not_empty.broadcast();
        let senders = self.not_full.broadcast();
        debug!(
            buffered = state.buffer.len(),
            receivers, senders, "channel closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Buffered item count. Best effort, for diagnostics only.
    pub fn size(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items received through a borrowed stream, ending at end-of-stream.
    pub fn stream(&self) -> impl Stream<Item = T> + '_ {
        futures::stream::unfold(self, |channel| async move {
            channel.receive().await.map(|item| (item, channel))
        })
    }

    /// Items received through a shared handle, ending at end-of-stream.
    pub fn into_stream(self: Arc<Self>) -> impl Stream<Item = T> + Send + 'static
    where
        T: Send + 'static,
    {
        futures::stream::unfold(self, |channel| async move {
            channel.receive().await.map(|item| (item, channel))
        })
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let channel: Channel<u8> = Channel::bounded(0);
        assert_eq!(channel.capacity(), 1);
        channel.send(1).await.unwrap();
        assert_eq!(channel.size(), 1);
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let channel = Channel::bounded(4);
        channel.send("a").await.unwrap();
        channel.close().await;
        channel.close().await;
        assert!(channel.is_closed());
        assert_eq!(channel.send("b").await, Err(SyncError::ChannelClosed));
        assert_eq!(channel.receive().await, Some("a"));
        assert_eq!(channel.receive().await, None);
    }

    #[tokio::test]
    async fn stream_ends_after_close() {
        let channel = Arc::new(Channel::bounded(8));
        for i in 0..5 {
            channel.send(i).await.unwrap();
        }
        channel.close().await;

        let items: Vec<i32> = channel.clone().into_stream().collect().await;
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        assert_eq!(Box::pin(channel.stream()).next().await, None);
    }
}
