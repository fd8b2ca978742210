use chrono::{DateTime, Utc};
use logroll_core::pattern::validate_strftime;
use logroll_core::{CompressionMode, RolloverEvent, RotationTrigger};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs::OpenOptions;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

mod writer;
use writer::{RollCommand, WriterInit};


use crate::errors::PipelineError;
use crate::pipeline::UploadPipeline;
use crate::shutdown::ShutdownReport;

/// Time-based rolling file configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RollingConfig {
    /// Active file, always written under this fixed name
    pub file: PathBuf,
    /// strftime pattern naming rolled files, e.g. "logs/app.%Y-%m-%d.log".
    /// The file rolls whenever the formatted value changes.
    pub file_name_pattern: String,
    #[serde(default)]
    pub compression: CompressionMode,
    /// Also roll when the active file reaches this size
    #[serde(default)]
    pub max_file_bytes: Option<u64>,
}

/// Rolling log file feeding the upload pipeline on every rollover.
#[derive(Debug, Clone)]
pub struct RollingFile {
    inner: Arc<RollingInner>,
}

#[derive(Debug)]
struct RollingInner {
    active: PathBuf,
    last_elapsed: Arc<Mutex<Option<PathBuf>>>,
    cmd_tx: mpsc::Sender<RollCommand>,
    writer_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    pipeline: Arc<UploadPipeline>,
}

impl RollingFile {
    /// Open (or create) the active file and start the background writer task.
    pub async fn open(
        cfg: RollingConfig,
        pipeline: Arc<UploadPipeline>,
    ) -> Result<Self, PipelineError> {
        validate_strftime(&cfg.file_name_pattern)?;
        if cfg.compression != pipeline.compressor().mode() {
            return Err(PipelineError::Config(format!(
                "rolling compression {} does not match pipeline compression {}",
                cfg.compression,
                pipeline.compressor().mode()
            )));
        }
        if let Some(parent) = cfg.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // A non-empty leftover active file belongs to the period it was last written in
        let (opened_at, bytes_in_file) = match tokio::fs::metadata(&cfg.file).await {
            Ok(meta) if meta.len() > 0 => (
                meta.modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
                meta.len(),
            ),
            _ => (Utc::now(), 0),
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.file)
            .await?;

        let last_elapsed = Arc::new(Mutex::new(None));
        let (cmd_tx, cmd_rx) = mpsc::channel(8192);
        let init = WriterInit {
            file,
            active: cfg.file.clone(),
            initial_period: opened_at.format(&cfg.file_name_pattern).to_string(),
            file_name_pattern: cfg.file_name_pattern,
            max_file_bytes: cfg.max_file_bytes,
            bytes_in_file,
            last_elapsed: last_elapsed.clone(),
            pipeline: pipeline.clone(),
        };
        let task = tokio::spawn(writer::run(init, cmd_rx));
        info!(target = "rolling", file = %cfg.file.display(), "rolling file opened");

        Ok(Self {
            inner: Arc::new(RollingInner {
                active: cfg.file,
                last_elapsed,
                cmd_tx,
                writer_task: tokio::sync::Mutex::new(Some(task)),
                pipeline,
            }),
        })
    }

    pub fn active_file(&self) -> &Path {
        &self.inner.active
    }

    /// Append bytes to the active file, rolling first if the period changed.
    pub async fn write(&self, bytes: impl Into<Vec<u8>>) -> Result<(), PipelineError> {
        self.inner
            .cmd_tx
            .send(RollCommand::Write(bytes.into()))
            .await
            .map_err(|_| PipelineError::Closed)
    }

    pub async fn flush(&self) -> Result<(), PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .cmd_tx
            .send(RollCommand::Flush(tx))
            .await
            .map_err(|_| PipelineError::Closed)?;
        rx.await.map_err(|_| PipelineError::Closed)?
    }

    /// Roll over now, regardless of period or size.
    pub async fn rotate(&self) -> Result<RolloverEvent, PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .cmd_tx
            .send(RollCommand::Rotate(tx))
            .await
            .map_err(|_| PipelineError::Closed)?;
        rx.await.map_err(|_| PipelineError::Closed)?
    }

    /// Close the active file, then compress and upload it and drain the pipeline.
    ///
    /// Returns `None` if the pipeline was already closed.
    pub async fn close(&self) -> Result<Option<ShutdownReport>, PipelineError> {
        let (tx, rx) = oneshot::channel();
        if self
            .inner
            .cmd_tx
            .send(RollCommand::Shutdown(tx))
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
        if let Some(task) = self.inner.writer_task.lock().await.take() {
            if let Err(e) = task.await {
                error!(target = "rolling", error = %e, "writer task failed, closing pipeline anyway");
            }
        }
        Ok(self.inner.pipeline.close(self).await)
    }
}

impl RotationTrigger for RollingFile {
    fn elapsed_periods_file_name(&self) -> Option<PathBuf> {
        self.inner
            .last_elapsed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn active_file_name(&self) -> std::io::Result<PathBuf> {
        Ok(self.inner.active.clone())
    }
}
