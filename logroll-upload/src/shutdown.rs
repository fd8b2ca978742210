use logroll_core::{RotationTrigger, StorageBackend};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::compressor::Compressor;
use crate::coordinator::RolloverCoordinator;
use crate::errors::PipelineError;
use crate::upload_pool::{UploadHandle, UploadOutcome};

pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Running = 0,
    Draining = 1,
    Stopped = 2,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PipelineState::Running,
            1 => PipelineState::Draining,
            _ => PipelineState::Stopped,
        }
    }
}

/// What happened during `close`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// The (possibly compressed) active file handed to the uploader
    pub final_file: Option<PathBuf>,
    /// Outcome of the final upload, `None` if it was not awaited to completion
    pub final_outcome: Option<UploadOutcome>,
    /// Some wait hit the drain timeout
    pub timed_out: bool,
    /// The upload pool was terminated forcibly
    pub forced: bool,
    /// Queued uploads dropped by the forced termination
    pub discarded: usize,
}

/// Runs the exit-time drain exactly once.
#[derive(Debug)]
pub struct ShutdownSequencer {
    coordinator: Arc<RolloverCoordinator>,
    compressor: Compressor,
    storage: Arc<dyn StorageBackend>,
    drain_timeout: Duration,
    state: AtomicU8,
}

impl ShutdownSequencer {
    pub fn new(
        coordinator: Arc<RolloverCoordinator>,
        compressor: Compressor,
        storage: Arc<dyn StorageBackend>,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            compressor,
            storage,
            drain_timeout,
            state: AtomicU8::new(PipelineState::Running as u8),
        }
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Compress and upload the active file, then drain the pipeline.
    ///
    /// Returns `None` when the pipeline was already closing or closed. Waiting is bounded
    /// by the drain timeout at every step; if the active file cannot be located,
    /// compressed or submitted, the upload pool is terminated forcibly instead.
    pub async fn close(&self, trigger: &dyn RotationTrigger) -> Option<ShutdownReport> {
        if self
            .state
            .compare_exchange(
                PipelineState::Running as u8,
                PipelineState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            info!(target = "shutdown", "pipeline already closing, ignoring close request");
            return None;
        }
        info!(target = "shutdown", timeout_secs = self.drain_timeout.as_secs(), "draining upload pipeline");

        let report = match self.finalize_active_file(trigger).await {
            Ok((file, handle)) => self.drain(file, handle).await,
            Err(e) => {
                error!(target = "shutdown", error = %e, "failed to upload active file, terminating upload pool");
                self.compressor.shutdown();
                let discarded = self.coordinator.pool().shutdown_now().await;
                ShutdownReport {
                    forced: true,
                    discarded,
                    ..Default::default()
                }
            }
        };

        if let Err(e) = self.storage.stop().await {
            warn!(target = "shutdown", error = %e, "storage backend stop failed");
        }
        self.state
            .store(PipelineState::Stopped as u8, Ordering::Release);
        info!(target = "shutdown", timed_out = report.timed_out, forced = report.forced, "upload pipeline stopped");
        Some(report)
    }

    async fn finalize_active_file(
        &self,
        trigger: &dyn RotationTrigger,
    ) -> Result<(PathBuf, UploadHandle), PipelineError> {
        let active = trigger.active_file_name()?;
        let compressor = self.compressor.clone();
        let file = tokio::task::spawn_blocking(move || compressor.compress_sync(&active)).await??;
        let handle = self.coordinator.pool().try_submit(file.clone())?;
        Ok((file, handle))
    }

    async fn drain(&self, final_file: PathBuf, final_handle: UploadHandle) -> ShutdownReport {
        let mut report = ShutdownReport {
            final_file: Some(final_file),
            ..Default::default()
        };

        if let Some(in_flight) = self.coordinator.take_in_flight() {
            let file = in_flight.file().display().to_string();
            if in_flight.wait(self.drain_timeout).await.is_none() {
                warn!(target = "shutdown", file = %file, "timed out waiting for the last rolled file, continuing best-effort");
                report.timed_out = true;
            }
        }

        match tokio::time::timeout(self.drain_timeout, final_handle.wait()).await {
            Ok(outcome) => report.final_outcome = Some(outcome),
            Err(_) => {
                warn!(target = "shutdown", "timed out waiting for the active file upload, continuing best-effort");
                report.timed_out = true;
            }
        }

        self.compressor.shutdown();
        self.coordinator.pool().shutdown();

        if !self.compressor.await_termination(self.drain_timeout).await {
            warn!(target = "shutdown", "compressions still running after drain timeout");
            report.timed_out = true;
        }
        if !self
            .coordinator
            .pool()
            .await_termination(self.drain_timeout)
            .await
        {
            warn!(target = "shutdown", "uploads still running after drain timeout");
            report.timed_out = true;
        }
        report
    }
}
