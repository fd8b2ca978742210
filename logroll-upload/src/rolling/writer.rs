use chrono::Utc;
use logroll_core::RolloverEvent;
use metrics::counter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::errors::PipelineError;
use crate::pipeline::UploadPipeline;
use crate::upload_metrics::ROLLOVER_TOTAL;

/// Commands sent from `RollingFile` to the background writer task.
///
/// The writer task owns the active file; callers only enqueue.
#[derive(Debug)]
pub(crate) enum RollCommand {
    Write(Vec<u8>),
    Flush(oneshot::Sender<Result<(), PipelineError>>),
    Rotate(oneshot::Sender<Result<RolloverEvent, PipelineError>>),
    Shutdown(oneshot::Sender<()>),
}

/// Init parameters captured when the rolling file is opened.
pub(crate) struct WriterInit {
    pub file: tokio::fs::File,
    pub active: PathBuf,
    pub file_name_pattern: String,
    pub max_file_bytes: Option<u64>,
    pub initial_period: String,
    pub bytes_in_file: u64,
    pub last_elapsed: Arc<Mutex<Option<PathBuf>>>,
    pub pipeline: Arc<UploadPipeline>,
}

/// Writer-owned state (no locking except the shared last-elapsed slot).
struct WriterState {
    writer: Option<BufWriter<tokio::fs::File>>,
    active: PathBuf,
    file_name_pattern: String,
    max_file_bytes: Option<u64>,
    /// `file_name_pattern` formatted for the period the active file belongs to;
    /// this is the name the active file gets when it rolls
    current_period: String,
    bytes_in_file: u64,
    last_elapsed: Arc<Mutex<Option<PathBuf>>>,
    pipeline: Arc<UploadPipeline>,
}

impl WriterState {
    async fn process_write(&mut self, bytes: &[u8]) -> Result<(), PipelineError> {
        self.roll_if_needed().await;
        let writer = self.ensure_writer().await?;
        writer.write_all(bytes).await?;
        self.bytes_in_file += bytes.len() as u64;
        Ok(())
    }

    async fn process_flush(&mut self) -> Result<(), PipelineError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    fn period_now(&self) -> String {
        Utc::now().format(&self.file_name_pattern).to_string()
    }

    /// Roll when the period changed since the active file was opened, or when the
    /// size threshold is reached. A failed roll is logged and writing continues on the
    /// active file.
    async fn roll_if_needed(&mut self) -> Option<RolloverEvent> {
        let period = self.period_now();
        let reason = if period != self.current_period {
            "time"
        } else if self
            .max_file_bytes
            .is_some_and(|max_bytes| self.bytes_in_file >= max_bytes)
        {
            "size"
        } else {
            return None;
        };
        match self.rollover(reason, period).await {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(target = "rolling", reason, error = %e, active = %self.active.display(), "rollover failed, continuing on the active file");
                None
            }
        }
    }

    /// Reopen the active file if an earlier roll left it closed.
    async fn ensure_writer(&mut self) -> Result<&mut BufWriter<tokio::fs::File>, PipelineError> {
        if self.writer.is_none() {
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.active)
                .await?;
            self.writer = Some(BufWriter::new(f));
        }
        self.writer.as_mut().ok_or(PipelineError::Closed)
    }

    /// Close the active file, rename it to its elapsed name, open a fresh active file
    /// and hand the elapsed file to the upload pipeline.
    ///
    /// When the rename fails the active file keeps its content and the period and size
    /// counters still restart, so the next attempt happens at the next boundary.
    async fn rollover(
        &mut self,
        reason: &'static str,
        next_period: String,
    ) -> Result<RolloverEvent, PipelineError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.shutdown().await?;
        }
        let elapsed = self.unique_elapsed_name();
        let renamed = move_file(&self.active, &elapsed).await;

        self.bytes_in_file = 0;
        self.current_period = next_period;
        self.ensure_writer().await?;
        renamed?;

        *self
            .last_elapsed
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(elapsed.clone());

        counter!(ROLLOVER_TOTAL.name, "reason" => reason).increment(1);
        info!(target = "rolling", reason, elapsed = %elapsed.display(), active = %self.active.display(), "rolled over log file");

        self.pipeline.on_rollover(Some(elapsed.clone()));
        Ok(RolloverEvent {
            elapsed_file_name: Some(elapsed),
            active_file_name: self.active.clone(),
        })
    }

    /// `current_period` as a path, with a `.N` suffix when that name (or its compressed
    /// form) is already taken by an earlier roll in the same period.
    fn unique_elapsed_name(&self) -> PathBuf {
        let mode = self.pipeline.compressor().mode();
        let taken = |p: &Path| p.exists() || mode.compressed_name(p).exists();
        let base = PathBuf::from(&self.current_period);
        if !taken(&base) {
            return base;
        }
        (1u32..)
            .map(|i| PathBuf::from(format!("{}.{}", self.current_period, i)))
            .find(|p| !taken(p))
            .unwrap_or(base)
    }
}

/// Rename `from` to `to`, creating missing directories of `to` first.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(dir) = to.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::rename(from, to).await
}

/// Background writer task entrypoint.
///
/// Processes commands until `Shutdown`, flushing and closing the active file before
/// acknowledging so the file can be compressed and uploaded.
pub(crate) async fn run(init: WriterInit, mut rx: mpsc::Receiver<RollCommand>) {
    let mut state = WriterState {
        writer: Some(BufWriter::new(init.file)),
        active: init.active,
        file_name_pattern: init.file_name_pattern,
        max_file_bytes: init.max_file_bytes,
        current_period: init.initial_period,
        bytes_in_file: init.bytes_in_file,
        last_elapsed: init.last_elapsed,
        pipeline: init.pipeline,
    };

    debug!(target = "rolling", active = %state.active.display(), period = %state.current_period, max_file_bytes = ?state.max_file_bytes, "writer task started");
    while let Some(cmd) = rx.recv().await {
        let res = match cmd {
            RollCommand::Write(bytes) => state.process_write(&bytes).await,
            RollCommand::Flush(ack) => {
                let _ = ack.send(state.process_flush().await);
                Ok(())
            }
            RollCommand::Rotate(ack) => {
                let period = state.period_now();
                let _ = ack.send(state.rollover("manual", period).await);
                Ok(())
            }
            RollCommand::Shutdown(ack) => {
                if let Some(mut writer) = state.writer.take() {
                    if let Err(e) = writer.flush().await {
                        warn!(target = "rolling", error = ?e, "flush on shutdown failed");
                    }
                    if let Err(e) = writer.shutdown().await {
                        warn!(target = "rolling", error = ?e, "close on shutdown failed");
                    }
                }
                let _ = ack.send(());
                debug!(target = "rolling", "writer task shutting down");
                break;
            }
        };
        if let Err(e) = res {
            warn!(target = "rolling", error = ?e, "background writer command failed");
        }
    }
}
