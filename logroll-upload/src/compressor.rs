use flate2::{write::GzEncoder, Compression};
use futures::future::BoxFuture;
use logroll_core::CompressionMode;
use metrics::{counter, histogram};
use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::errors::PipelineError;
use crate::upload_metrics::{COMPRESSION_LATENCY_MS, COMPRESSION_TOTAL};

/// Completion handle of one compression. Resolves to the compressed file name.
pub struct CompressionHandle {
    fut: BoxFuture<'static, Result<PathBuf, PipelineError>>,
}

impl CompressionHandle {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<PathBuf, PipelineError>> + Send + 'static,
    {
        Self { fut: Box::pin(fut) }
    }

    pub fn from_task(task: JoinHandle<Result<PathBuf, PipelineError>>) -> Self {
        Self::new(async move { task.await? })
    }

    pub fn ready(res: Result<PathBuf, PipelineError>) -> Self {
        Self::new(async move { res })
    }

    pub async fn wait(self) -> Result<PathBuf, PipelineError> {
        self.fut.await
    }
}

impl fmt::Debug for CompressionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionHandle").finish_non_exhaustive()
    }
}

/// Compresses rolled files with the configured mode.
///
/// Asynchronous compressions run as blocking tasks tracked by a `TaskTracker`, which
/// plays the role of the shared background scheduler: `shutdown` stops new work and
/// `await_termination` waits for the outstanding compressions.
#[derive(Debug, Clone)]
pub struct Compressor {
    mode: CompressionMode,
    tracker: TaskTracker,
}

impl Compressor {
    pub fn new(mode: CompressionMode) -> Self {
        Self {
            mode,
            tracker: TaskTracker::new(),
        }
    }

    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    /// Schedule compression of `source` in the background.
    pub fn compress_async(&self, source: PathBuf, runtime: &Handle) -> CompressionHandle {
        if self.tracker.is_closed() {
            warn!(target = "compressor", file = %source.display(), "compressor is shut down, rejecting compression");
            return CompressionHandle::ready(Err(PipelineError::Closed));
        }
        let this = self.clone();
        let task = self
            .tracker
            .spawn_blocking_on(move || this.compress_sync(&source), runtime);
        CompressionHandle::from_task(task)
    }

    /// Compress `source` on the calling thread and return the compressed file name.
    ///
    /// With compression disabled the source is returned unchanged. A missing source is
    /// logged and skipped; the derived name is still returned.
    pub fn compress_sync(&self, source: &Path) -> Result<PathBuf, PipelineError> {
        let target = self.mode.compressed_name(source);
        if !self.mode.is_enabled() {
            return Ok(target);
        }
        let mode = self.mode.name();
        if !source.exists() {
            warn!(target = "compressor", file = %source.display(), "file to compress does not exist, skipping");
            counter!(COMPRESSION_TOTAL.name, "mode" => mode, "result" => "missing").increment(1);
            return Ok(target);
        }

        let started = Instant::now();
        debug!(target = "compressor", file = %source.display(), target_file = %target.display(), mode, "compressing");
        if let Err(e) = compress_file(self.mode, source, &target) {
            let _ = std::fs::remove_file(&target);
            counter!(COMPRESSION_TOTAL.name, "mode" => mode, "result" => "error").increment(1);
            return Err(PipelineError::Compression {
                path: source.to_path_buf(),
                reason: e.to_string(),
            });
        }
        std::fs::remove_file(source)?;

        counter!(COMPRESSION_TOTAL.name, "mode" => mode, "result" => "success").increment(1);
        histogram!(COMPRESSION_LATENCY_MS.name, "mode" => mode)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        info!(target = "compressor", file = %target.display(), "compressed rolled file");
        Ok(target)
    }

    /// Stop accepting new compressions; outstanding ones keep running.
    pub fn shutdown(&self) {
        self.tracker.close();
    }

    /// Wait for outstanding compressions after `shutdown`. Returns false on timeout.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }
}

fn compress_file(mode: CompressionMode, source: &Path, target: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(source)?);
    let writer = BufWriter::new(File::create(target)?);
    match mode {
        CompressionMode::Gz => {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?.flush()?;
        }
        CompressionMode::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(writer, 0)?;
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?.flush()?;
        }
        CompressionMode::None => {}
    }
    Ok(())
}
