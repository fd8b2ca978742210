// Storage backends: no-op sink and opendal-backed object store

pub mod noop;
pub mod object_store;
pub mod storage_config;

pub use noop::NoopStorage;
pub use object_store::ObjectStorage;
pub use storage_config::{BackendConfig, CloudBackend, LocalBackend};

use logroll_core::StorageBackend;
use std::sync::Arc;

use crate::errors::PipelineError;

/// Pick the storage sink: the object store when uploads are enabled, the no-op sink otherwise.
pub fn select_storage(
    enable_upload: bool,
    backend: Option<BackendConfig>,
) -> Result<Arc<dyn StorageBackend>, PipelineError> {
    if !enable_upload {
        return Ok(Arc::new(NoopStorage));
    }
    let backend = backend.ok_or_else(|| {
        PipelineError::Config("enable_upload is set but no storage backend is configured".into())
    })?;
    Ok(Arc::new(ObjectStorage::new(backend)))
}
