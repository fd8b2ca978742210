use async_trait::async_trait;
use logroll_core::{CompressionMode, RotationTrigger, StorageBackend, StorageBackendError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::compressor::Compressor;
use crate::coordinator::RolloverCoordinator;
use crate::shutdown::ShutdownSequencer;
use crate::upload_pool::{UploadPool, UploadPoolConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub file: PathBuf,
    pub bytes: Vec<u8>,
}

/// Storage stub recording every put, with optional latency, failure and a gate
/// that holds puts until permits are added.
#[derive(Debug, Default)]
pub(crate) struct RecordingStorage {
    puts: Mutex<Vec<PutRecord>>,
    fail: bool,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl RecordingStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(gate),
            ..Default::default()
        })
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().unwrap().clone()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for RecordingStorage {
    async fn start(&self) -> Result<(), StorageBackendError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        local_file: &Path,
    ) -> Result<(), StorageBackendError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let bytes = std::fs::read(local_file).unwrap_or_default();
        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail {
            return Err(StorageBackendError::ObjectStore("access denied".into()));
        }
        self.puts.lock().unwrap().push(PutRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            file: local_file.to_path_buf(),
            bytes,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), StorageBackendError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn provider(&self) -> &'static str {
        "recording"
    }
}

/// Rotation trigger with a fixed active file, or a failure when `active` is `None`.
pub(crate) struct StaticTrigger {
    pub active: Option<PathBuf>,
}

impl RotationTrigger for StaticTrigger {
    fn elapsed_periods_file_name(&self) -> Option<PathBuf> {
        None
    }

    fn active_file_name(&self) -> std::io::Result<PathBuf> {
        self.active.clone().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "active file unknown")
        })
    }
}

pub(crate) fn make_pool(storage: Arc<dyn StorageBackend>, concurrency: usize) -> UploadPool {
    UploadPool::new(
        UploadPoolConfig {
            bucket: "test-bucket".to_string(),
            folder_pattern: None,
            concurrency,
        },
        storage,
        &Handle::current(),
    )
}

pub(crate) fn make_sequencer(
    mode: CompressionMode,
    storage: Arc<dyn StorageBackend>,
    concurrency: usize,
    drain_timeout: Duration,
) -> (Arc<RolloverCoordinator>, ShutdownSequencer) {
    let pool = make_pool(storage.clone(), concurrency);
    let coordinator = Arc::new(RolloverCoordinator::new(mode, pool, Handle::current()));
    let sequencer = ShutdownSequencer::new(
        coordinator.clone(),
        Compressor::new(mode),
        storage,
        drain_timeout,
    );
    (coordinator, sequencer)
}

// Simple async wait helper: polls condition up to timeout_ms.
pub(crate) async fn wait_for_condition<F>(mut f: F, timeout_ms: u64, interval_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let mut waited = 0u64;
    while waited <= timeout_ms {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        waited += interval_ms;
    }
    false
}
