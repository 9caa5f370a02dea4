use lexio_core::LexioError;
use thiserror::Error;

/// Violations reported by the synchronization primitives.
///
/// These always propagate to the immediate caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("lock misuse: {0}")]
    LockMisuse(&'static str),

    #[error("channel closed")]
    ChannelClosed,
}

impl From<SyncError> for LexioError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::LockMisuse(msg) => LexioError::LockMisuse(msg.to_string()),
            SyncError::ChannelClosed => LexioError::ChannelClosed,
        }
    }
}
