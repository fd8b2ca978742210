use chrono::{DateTime, Utc};
use futures::FutureExt;
use logroll_core::{FolderPattern, StorageBackend};
use metrics::{counter, histogram};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::errors::PipelineError;
use crate::upload_metrics::{
    UPLOAD_BYTES_TOTAL, UPLOAD_DISCARDED_TOTAL, UPLOAD_LATENCY_MS, UPLOAD_OBJECTS_TOTAL,
};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Destination key of an uploaded file: `[folder_pattern(now) + "/"] + base_name(local_file)`.
pub fn destination_key(
    folder_pattern: Option<&dyn FolderPattern>,
    now: DateTime<Utc>,
    local_file: &Path,
) -> String {
    let base = local_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match folder_pattern.map(|p| p.convert(now)) {
        Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix, base),
        _ => base,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub local_file: PathBuf,
    pub destination_key: String,
}

/// How an upload task ended. Every variant counts as completion for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// The local file did not exist, nothing was sent
    Skipped,
    /// The storage backend failed; logged and swallowed
    Failed,
    /// Dropped from the queue by a forced shutdown
    Discarded,
}

/// Completion handle of one submitted upload.
#[derive(Debug)]
pub struct UploadHandle {
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Ready(UploadOutcome),
    Pending(oneshot::Receiver<UploadOutcome>),
}

impl UploadHandle {
    fn ready(outcome: UploadOutcome) -> Self {
        Self {
            state: HandleState::Ready(outcome),
        }
    }

    pub async fn wait(self) -> UploadOutcome {
        match self.state {
            HandleState::Ready(outcome) => outcome,
            HandleState::Pending(rx) => rx.await.unwrap_or(UploadOutcome::Discarded),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadPoolConfig {
    pub bucket: String,
    pub folder_pattern: Option<Arc<dyn FolderPattern>>,
    pub concurrency: usize,
}

struct Job {
    task: UploadTask,
    done: oneshot::Sender<UploadOutcome>,
}

/// Fixed-size pool of upload workers fed by an unbounded FIFO queue.
///
/// Cheap to clone; clones share the same queue and workers.
#[derive(Debug, Clone)]
pub struct UploadPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    bucket: String,
    folder_pattern: Option<Arc<dyn FolderPattern>>,
    concurrency: usize,
    storage: Arc<dyn StorageBackend>,
    /// Taken on shutdown so the queue closes once drained
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("task", &self.task).finish()
    }
}

impl UploadPool {
    /// Spawn `cfg.concurrency` workers on `runtime`.
    pub fn new(cfg: UploadPoolConfig, storage: Arc<dyn StorageBackend>, runtime: &Handle) -> Self {
        let concurrency = cfg.concurrency.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(PoolInner {
            bucket: cfg.bucket,
            folder_pattern: cfg.folder_pattern,
            concurrency,
            storage,
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        });
        for worker_id in 0..concurrency {
            inner
                .tracker
                .spawn_on(worker_loop(worker_id, inner.clone()), runtime);
        }
        info!(target = "uploader", concurrency, bucket = %inner.bucket, provider = inner.storage.provider(), "upload pool started");
        Self { inner }
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Queue an upload of `local_file`, failing only when the pool is shut down.
    ///
    /// Never touches the filesystem: a worker checks the file exists when it picks the
    /// task up and completes it as `Skipped` otherwise. The destination key is resolved
    /// now, not when a worker picks the task up.
    pub fn try_submit(&self, local_file: PathBuf) -> Result<UploadHandle, PipelineError> {
        let destination_key = destination_key(
            self.inner.folder_pattern.as_deref(),
            Utc::now(),
            &local_file,
        );
        let task = UploadTask {
            local_file,
            destination_key,
        };

        let guard = self.inner.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(PipelineError::Closed)?;
        let (done, rx) = oneshot::channel();
        tx.send(Job { task, done })
            .map_err(|_| PipelineError::Closed)?;
        Ok(UploadHandle {
            state: HandleState::Pending(rx),
        })
    }

    /// Like `try_submit`, but a rejected task is logged and reported as `Discarded`.
    pub fn submit(&self, local_file: PathBuf) -> UploadHandle {
        let shown = local_file.display().to_string();
        match self.try_submit(local_file) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(target = "uploader", file = %shown, error = %e, "upload rejected");
                UploadHandle::ready(UploadOutcome::Discarded)
            }
        }
    }

    /// Stop accepting tasks; queued tasks still run.
    pub fn shutdown(&self) {
        let tx = self
            .inner
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(tx);
        self.inner.tracker.close();
    }

    /// Wait for the workers to finish after `shutdown`. Returns false on timeout.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.inner.tracker.wait())
            .await
            .is_ok()
    }

    /// Stop immediately: discard queued tasks and stop every worker after its current upload.
    /// Returns the number of discarded tasks.
    pub async fn shutdown_now(&self) -> usize {
        self.shutdown();
        self.inner.cancel.cancel();

        let mut rx = self.inner.rx.lock().await;
        rx.close();
        let mut discarded = 0usize;
        while let Ok(job) = rx.try_recv() {
            debug!(target = "uploader", file = %job.task.local_file.display(), "discarding queued upload");
            discarded += 1;
        }
        if discarded > 0 {
            counter!(UPLOAD_DISCARDED_TOTAL.name).increment(discarded as u64);
        }
        warn!(target = "uploader", discarded, "upload pool terminated forcibly");
        discarded
    }
}

async fn worker_loop(worker_id: usize, inner: Arc<PoolInner>) {
    loop {
        let job = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => None,
            job = async { inner.rx.lock().await.recv().await } => job,
        };
        let Some(job) = job else {
            break;
        };
        let outcome = inner.upload(&job.task).await;
        let _ = job.done.send(outcome);
    }
    debug!(target = "uploader", worker_id, "upload worker stopped");
}

impl PoolInner {
    async fn upload(&self, task: &UploadTask) -> UploadOutcome {
        let provider = self.storage.provider();
        let file = &task.local_file;
        let size = match tokio::fs::metadata(file).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                debug!(target = "uploader", file = %file.display(), "file does not exist, nothing to upload");
                counter!(UPLOAD_OBJECTS_TOTAL.name, "provider" => provider, "result" => "skipped").increment(1);
                return UploadOutcome::Skipped;
            }
        };

        info!(target = "uploader", file = %file.display(), bucket = %self.bucket, key = %task.destination_key, "uploading file");
        let started = Instant::now();
        let res = AssertUnwindSafe(self.storage.put(&self.bucket, &task.destination_key, file))
            .catch_unwind()
            .await;
        match res {
            Ok(Ok(())) => {
                counter!(UPLOAD_OBJECTS_TOTAL.name, "provider" => provider, "result" => "success").increment(1);
                counter!(UPLOAD_BYTES_TOTAL.name, "provider" => provider).increment(size);
                histogram!(UPLOAD_LATENCY_MS.name, "provider" => provider)
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                info!(target = "uploader", file = %file.display(), key = %task.destination_key, bytes = size, "successfully uploaded file");
                UploadOutcome::Uploaded
            }
            Ok(Err(e)) => {
                counter!(UPLOAD_OBJECTS_TOTAL.name, "provider" => provider, "result" => "error").increment(1);
                error!(target = "uploader", file = %file.display(), key = %task.destination_key, error = %e, "could not upload file");
                UploadOutcome::Failed
            }
            Err(_) => {
                counter!(UPLOAD_OBJECTS_TOTAL.name, "provider" => provider, "result" => "error").increment(1);
                error!(target = "uploader", file = %file.display(), key = %task.destination_key, "storage backend panicked while uploading file");
                UploadOutcome::Failed
            }
        }
    }
}
