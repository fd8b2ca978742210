use logroll_core::{CompressionMode, DateFolderPattern, FolderPattern, RotationTrigger, StorageBackend};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

use crate::compressor::Compressor;
use crate::coordinator::RolloverCoordinator;
use crate::errors::PipelineError;
use crate::shutdown::{PipelineState, ShutdownReport, ShutdownSequencer, DEFAULT_DRAIN_TIMEOUT};
use crate::upload_pool::{UploadPool, UploadPoolConfig, DEFAULT_CONCURRENCY};

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_drain_timeout_secs() -> u64 {
    DEFAULT_DRAIN_TIMEOUT.as_secs()
}

/// Upload options recognized by the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Destination namespace handed to every `put`
    pub bucket: String,
    /// strftime prefix evaluated when each upload is submitted, e.g. "%Y/%m/%d"
    #[serde(default)]
    pub folder_pattern: Option<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Selects the object store; when false a no-op sink is used
    #[serde(default)]
    pub enable_upload: bool,
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            folder_pattern: None,
            concurrency: DEFAULT_CONCURRENCY,
            enable_upload: false,
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT.as_secs(),
        }
    }
}

impl UploadConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Compression and upload stages wired behind one rollover entry point and one `close`.
#[derive(Debug)]
pub struct UploadPipeline {
    coordinator: Arc<RolloverCoordinator>,
    compressor: Compressor,
    sequencer: ShutdownSequencer,
    runtime: Handle,
}

impl UploadPipeline {
    /// Build the stages and start the storage backend. Must be called inside a tokio runtime.
    pub async fn start(
        cfg: &UploadConfig,
        mode: CompressionMode,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self, PipelineError> {
        Self::start_with_timeout(cfg, mode, storage, cfg.drain_timeout()).await
    }

    /// Like `start`, with an explicit drain timeout overriding the configured one.
    pub async fn start_with_timeout(
        cfg: &UploadConfig,
        mode: CompressionMode,
        storage: Arc<dyn StorageBackend>,
        drain_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        if cfg.enable_upload && cfg.bucket.trim().is_empty() {
            return Err(PipelineError::Config(
                "bucket is required when enable_upload is set".into(),
            ));
        }
        let folder_pattern: Option<Arc<dyn FolderPattern>> = match &cfg.folder_pattern {
            Some(p) => Some(Arc::new(DateFolderPattern::new(p.clone())?)),
            None => None,
        };

        storage.start().await?;

        let runtime = Handle::current();
        let pool = UploadPool::new(
            UploadPoolConfig {
                bucket: cfg.bucket.clone(),
                folder_pattern,
                concurrency: cfg.concurrency,
            },
            storage.clone(),
            &runtime,
        );
        let compressor = Compressor::new(mode);
        let coordinator = Arc::new(RolloverCoordinator::new(mode, pool, runtime.clone()));
        let sequencer = ShutdownSequencer::new(
            coordinator.clone(),
            compressor.clone(),
            storage.clone(),
            drain_timeout,
        );
        info!(
            target = "pipeline",
            bucket = %cfg.bucket,
            mode = %mode,
            provider = storage.provider(),
            "upload pipeline started"
        );
        Ok(Self {
            coordinator,
            compressor,
            sequencer,
            runtime,
        })
    }

    pub fn coordinator(&self) -> &Arc<RolloverCoordinator> {
        &self.coordinator
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    pub fn state(&self) -> PipelineState {
        self.sequencer.state()
    }

    /// Entry point for the rotation trigger: start the async compression of the elapsed
    /// file (when a mode is configured) and chain its upload.
    pub fn on_rollover(&self, elapsed_file_name: Option<PathBuf>) {
        let compression = match (&elapsed_file_name, self.compressor.mode().is_enabled()) {
            (Some(elapsed), true) => Some(
                self.compressor
                    .compress_async(elapsed.clone(), &self.runtime),
            ),
            _ => None,
        };
        self.coordinator
            .trigger_upload(elapsed_file_name, compression);
    }

    /// Upload the active file and drain the pipeline. Idempotent.
    pub async fn close(&self, trigger: &dyn RotationTrigger) -> Option<ShutdownReport> {
        self.sequencer.close(trigger).await
    }
}
