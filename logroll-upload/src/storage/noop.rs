use async_trait::async_trait;
use logroll_core::{StorageBackend, StorageBackendError};
use std::path::Path;

/// Sink used when uploads are disabled; accepts every file and stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStorage;

#[async_trait]
impl StorageBackend for NoopStorage {
    async fn start(&self) -> Result<(), StorageBackendError> {
        Ok(())
    }

    async fn put(
        &self,
        _bucket: &str,
        _key: &str,
        _local_file: &Path,
    ) -> Result<(), StorageBackendError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), StorageBackendError> {
        Ok(())
    }

    fn provider(&self) -> &'static str {
        "noop"
    }
}
