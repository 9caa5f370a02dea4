//! Producer/consumer hand-off of generated exercises.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use lexio_core::config::QueueConfig;
use lexio_core::{Exercise, Result};
use lexio_sync::{Channel, Semaphore};
use tracing::debug;

/// Ordered stream of queued exercises. Each item reaches exactly one
/// subscriber; the stream ends once the queue is closed and drained.
pub type ExerciseStream = BoxStream<'static, Exercise>;

pub struct ExerciseQueue {
    channel: Arc<Channel<Exercise>>,
    /// Caps how many producers may be inside `enqueue` at once.
    producers: Semaphore,
}

impl ExerciseQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            channel: Arc::new(Channel::bounded(config.capacity)),
            producers: Semaphore::new(config.producer_permits.max(1)),
        }
    }

    /// Publish an exercise, waiting while the buffer is full.
    ///
    /// Fails with `ChannelClosed` once the queue has been closed.
    pub async fn enqueue(&self, exercise: Exercise) -> Result<()> {
        let _permit = self.producers.acquire().await;
        debug!(exercise_id = %exercise.id, kind = %exercise.kind, "enqueueing exercise");
        self.channel.send(exercise).await?;
        Ok(())
    }

    pub fn subscribe(&self) -> ExerciseStream {
        Arc::clone(&self.channel).into_stream().boxed()
    }

    /// Stop accepting exercises. Subscribers still get what is buffered.
    pub async fn close(&self) {
        self.channel.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Buffered exercises right now. Diagnostic only.
    pub fn len(&self) -> usize {
        self.channel.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }
}
