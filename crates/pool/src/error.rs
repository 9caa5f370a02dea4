use lexio_core::LexioError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PoolError {
    /// The worker crashed while running this task. The slot has been restarted.
    #[error("worker {worker} faulted on task {task_id}: {reason}")]
    WorkerFault {
        worker: usize,
        task_id: Uuid,
        reason: String,
    },

    /// The handler rejected the task; the worker is still healthy.
    #[error("task {task_id} failed: {reason}")]
    Task { task_id: Uuid, reason: String },

    #[error("worker pool is shut down")]
    ShutDown,

    /// Every worker died and none could be respawned.
    #[error("worker pool has no live workers")]
    NoWorkers,

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

impl From<PoolError> for LexioError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Task { reason, .. } => LexioError::Evaluation(reason),
            other => LexioError::WorkerFault(other.to_string()),
        }
    }
}
