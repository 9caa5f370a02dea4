use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexioError {
    #[error("exercise template not found: {0}")]
    TemplateNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("worker fault: {0}")]
    WorkerFault(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error("lock misuse: {0}")]
    LockMisuse(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = LexioError> = std::result::Result<T, E>;
