use logroll_core::CompressionMode;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::compressor::CompressionHandle;
use crate::upload_pool::{UploadOutcome, UploadPool};

/// The most recently started compression -> upload chain.
#[derive(Debug)]
pub struct InFlight {
    file: PathBuf,
    started: Instant,
    task: JoinHandle<UploadOutcome>,
}

impl InFlight {
    pub fn file(&self) -> &PathBuf {
        &self.file
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the chain up to `timeout`. On timeout the chain keeps running
    /// detached and `None` is returned.
    pub async fn wait(self, timeout: Duration) -> Option<UploadOutcome> {
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(e)) => {
                warn!(target = "coordinator", file = %self.file.display(), error = %e, "in-flight upload chain failed");
                Some(UploadOutcome::Failed)
            }
            Err(_) => None,
        }
    }
}

/// Schedules the upload of every rolled file and tracks the latest chain for shutdown.
///
/// Only the most recent chain is tracked: a new rollover replaces the slot and the
/// replaced chain keeps running unobserved.
#[derive(Debug)]
pub struct RolloverCoordinator {
    mode: CompressionMode,
    pool: UploadPool,
    in_flight: Mutex<Option<InFlight>>,
    runtime: Handle,
}

impl RolloverCoordinator {
    pub fn new(mode: CompressionMode, pool: UploadPool, runtime: Handle) -> Self {
        Self {
            mode,
            pool,
            in_flight: Mutex::new(None),
            runtime,
        }
    }

    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    pub fn pool(&self) -> &UploadPool {
        &self.pool
    }

    /// Schedule the upload of the file closed by a rollover. Never blocks and never fails.
    ///
    /// With compression enabled, `compression` is the handle of the compression the
    /// rotation trigger started for `elapsed_file_name`; the upload of the compressed
    /// file is submitted only once it completes. A failed compression is logged and the
    /// upload is still attempted.
    pub fn trigger_upload(
        &self,
        elapsed_file_name: Option<PathBuf>,
        compression: Option<CompressionHandle>,
    ) {
        let Some(elapsed) = elapsed_file_name else {
            debug!(target = "coordinator", "rollover without an elapsed file, nothing to upload");
            return;
        };

        if !self.mode.is_enabled() {
            let handle = self.pool.submit(elapsed.clone());
            let task = self.runtime.spawn(handle.wait());
            self.replace_in_flight(elapsed, task);
            return;
        }

        let compression = compression.unwrap_or_else(|| {
            debug!(target = "coordinator", file = %elapsed.display(), "no compression handle, uploading compressed name directly");
            CompressionHandle::ready(Ok(self.mode.compressed_name(&elapsed)))
        });
        let compressed = self.mode.compressed_name(&elapsed);
        let pool = self.pool.clone();
        let source = elapsed.clone();
        let task = self.runtime.spawn(async move {
            if let Err(e) = compression.wait().await {
                warn!(target = "coordinator", file = %source.display(), error = %e, "compression failed, attempting upload anyway");
            }
            pool.submit(compressed).wait().await
        });
        self.replace_in_flight(elapsed, task);
    }

    fn replace_in_flight(&self, file: PathBuf, task: JoinHandle<UploadOutcome>) {
        let next = InFlight {
            file,
            started: Instant::now(),
            task,
        };
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = slot.replace(next) {
            if !prev.is_finished() {
                debug!(
                    target = "coordinator",
                    file = %prev.file.display(),
                    age_ms = prev.started.elapsed().as_millis() as u64,
                    "replacing unfinished upload chain, it keeps running untracked"
                );
            }
        }
    }

    /// Remove and return the tracked chain, if any.
    pub fn take_in_flight(&self) -> Option<InFlight> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
