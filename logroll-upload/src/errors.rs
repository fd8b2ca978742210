use logroll_core::{PatternError, StorageBackendError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageBackendError),
    #[error("compression of {} failed: {reason}", path.display())]
    Compression { path: PathBuf, reason: String },
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("pipeline is shut down")]
    Closed,
}
