use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageBackendError {
    #[error("storage backend is not started")]
    NotStarted,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object store error: {0}")]
    ObjectStore(String),
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

/// Sink for rolled log files.
///
/// Implementations are shared by every upload worker and must be reentrant;
/// `start` and `stop` bracket the lifetime of the whole pipeline, not of a
/// single upload.
#[async_trait]
pub trait StorageBackend: std::fmt::Debug + Send + Sync + 'static {
    async fn start(&self) -> Result<(), StorageBackendError>;

    /// Store `local_file` under `key` inside `bucket`.
    async fn put(&self, bucket: &str, key: &str, local_file: &Path)
        -> Result<(), StorageBackendError>;

    async fn stop(&self) -> Result<(), StorageBackendError>;

    /// Short provider label used for metrics and logs (e.g. "s3", "noop").
    fn provider(&self) -> &'static str;
}
