use async_trait::async_trait;
use logroll_core::{StorageBackend, StorageBackendError};
use opendal::services::{Fs, Gcs, Memory, S3};
use opendal::Operator;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::storage_config::{
    normalize_prefix, split_fs_root, BackendConfig, CloudBackend, LocalBackend,
};

const UPLOAD_CHUNK_BYTES: usize = 8 * 1024 * 1024;

/// Object store sink built on opendal.
///
/// One operator is built lazily per bucket. For cloud backends the bucket is the
/// provider bucket; for local backends it becomes the first path segment under `root`.
#[derive(Debug)]
pub struct ObjectStorage {
    cfg: BackendConfig,
    /// `None` until `start` and after `stop`
    operators: RwLock<Option<HashMap<String, Operator>>>,
}

fn warn_unknown_options(service: &str, options: &HashMap<String, String>, allowed: &[&str]) {
    for k in options.keys() {
        if !allowed.contains(&k.as_str()) {
            warn!(
                target: "object_store",
                "unknown {} option '{}'; accepted keys: {:?}",
                service,
                k,
                allowed
            );
        }
    }
}

impl ObjectStorage {
    pub fn new(cfg: BackendConfig) -> Self {
        Self {
            cfg,
            operators: RwLock::new(None),
        }
    }

    /// Read an object back; used by tooling and tests to verify uploads.
    pub async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageBackendError> {
        let (op, path) = self.operator_for(bucket, key)?;
        let data = op.read(&path).await.map_err(|e| {
            StorageBackendError::ObjectStore(format!("read {}/{}: {}", bucket, path, e))
        })?;
        Ok(data.to_vec())
    }

    /// Resolve the operator for `bucket` (building it on first use) and the full object path.
    fn operator_for(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<(Operator, String), StorageBackendError> {
        let path = self.join(bucket, key);
        {
            let guard = self.operators.read().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                None => return Err(StorageBackendError::NotStarted),
                Some(ops) => {
                    if let Some(op) = ops.get(bucket) {
                        return Ok((op.clone(), path));
                    }
                }
            }
        }
        let mut guard = self.operators.write().unwrap_or_else(PoisonError::into_inner);
        let ops = guard.as_mut().ok_or(StorageBackendError::NotStarted)?;
        if let Some(op) = ops.get(bucket) {
            return Ok((op.clone(), path));
        }
        let op = self.build_operator(bucket)?;
        debug!(target: "object_store", provider = self.cfg.provider(), bucket, "built operator");
        ops.insert(bucket.to_string(), op.clone());
        Ok((op, path))
    }

    fn build_operator(&self, bucket: &str) -> Result<Operator, StorageBackendError> {
        if bucket.trim().is_empty() {
            return Err(StorageBackendError::Config("bucket must not be empty".into()));
        }
        let op = match &self.cfg {
            BackendConfig::Cloud {
                backend: CloudBackend::S3,
                root,
                options,
            } => {
                warn_unknown_options(
                    "s3",
                    options,
                    &["endpoint", "region", "access_key", "secret_key"],
                );
                // Builders in opendal 0.54 consume self: use chaining/reassignment
                let mut builder = S3::default().bucket(bucket);
                let prefix = normalize_prefix(root);
                if !prefix.is_empty() {
                    // S3 root must be an absolute path
                    builder = builder.root(&format!("/{}", prefix));
                }
                if let Some(endpoint) = options.get("endpoint") {
                    builder = builder.endpoint(endpoint);
                }
                if let Some(region) = options.get("region") {
                    builder = builder.region(region);
                }
                if let Some(ak) = options.get("access_key") {
                    builder = builder.access_key_id(ak);
                }
                if let Some(sk) = options.get("secret_key") {
                    builder = builder.secret_access_key(sk);
                }
                Operator::new(builder)
                    .map_err(|e| StorageBackendError::Config(format!("opendal s3 builder: {}", e)))?
                    .finish()
            }
            BackendConfig::Cloud {
                backend: CloudBackend::Gcs,
                root,
                options,
            } => {
                warn_unknown_options("gcs", options, &["endpoint", "credential_file"]);
                let mut builder = Gcs::default().bucket(bucket);
                let prefix = normalize_prefix(root);
                if !prefix.is_empty() {
                    builder = builder.root(&format!("/{}", prefix));
                }
                if let Some(cred_file) = options.get("credential_file") {
                    builder = builder.credential_path(cred_file);
                }
                if let Some(endpoint) = options.get("endpoint") {
                    builder = builder.endpoint(endpoint);
                }
                Operator::new(builder)
                    .map_err(|e| StorageBackendError::Config(format!("opendal gcs builder: {}", e)))?
                    .finish()
            }
            BackendConfig::Local {
                backend: LocalBackend::Fs,
                root,
            } => {
                let fs_root = Path::new(&split_fs_root(root)).join(bucket);
                let builder = Fs::default().root(&fs_root.to_string_lossy());
                Operator::new(builder)
                    .map_err(|e| StorageBackendError::Config(format!("opendal fs builder: {}", e)))?
                    .finish()
            }
            BackendConfig::Local {
                backend: LocalBackend::Memory,
                ..
            } => Operator::new(Memory::default())
                .map_err(|e| StorageBackendError::Config(format!("opendal memory builder: {}", e)))?
                .finish(),
        };
        Ok(op)
    }

    #[inline]
    fn join(&self, bucket: &str, key: &str) -> String {
        let key = key.trim_matches('/');
        match &self.cfg {
            // Memory keeps one operator per bucket; the root is a logical namespace
            BackendConfig::Local {
                backend: LocalBackend::Memory,
                root,
            } => {
                let mut parts: Vec<String> = Vec::with_capacity(3);
                let prefix = normalize_prefix(root);
                if !prefix.is_empty() {
                    parts.push(prefix);
                }
                parts.push(normalize_prefix(bucket));
                parts.push(key.to_string());
                parts.join("/")
            }
            _ => key.to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    async fn start(&self) -> Result<(), StorageBackendError> {
        if let BackendConfig::Local {
            backend: LocalBackend::Fs,
            root,
        } = &self.cfg
        {
            tokio::fs::create_dir_all(split_fs_root(root)).await?;
        }
        let mut guard = self.operators.write().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(HashMap::new());
        }
        info!(target: "object_store", provider = self.cfg.provider(), "object storage started");
        Ok(())
    }

    /// Stream the file to the object store in fixed-size chunks so large rolled
    /// files never have to be buffered whole.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        local_file: &Path,
    ) -> Result<(), StorageBackendError> {
        let (op, path) = self.operator_for(bucket, key)?;
        let mut file = tokio::fs::File::open(local_file).await?;
        let mut writer = op
            .writer_with(&path)
            .chunk(UPLOAD_CHUNK_BYTES)
            .await
            .map_err(|e| StorageBackendError::ObjectStore(format!("writer {}: {}", path, e)))?;

        let mut buf = vec![0u8; UPLOAD_CHUNK_BYTES];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            if let Err(e) = writer.write(buf[..n].to_vec()).await {
                let _ = writer.abort().await;
                return Err(StorageBackendError::ObjectStore(format!(
                    "write {}: {}",
                    path, e
                )));
            }
        }
        writer
            .close()
            .await
            .map_err(|e| StorageBackendError::ObjectStore(format!("close {}: {}", path, e)))?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), StorageBackendError> {
        let mut guard = self.operators.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        info!(target: "object_store", provider = self.cfg.provider(), "object storage stopped");
        Ok(())
    }

    fn provider(&self) -> &'static str {
        self.cfg.provider()
    }
}
