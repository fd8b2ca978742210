#[cfg(test)]
mod tests {
    use crate::compressor::CompressionHandle;
    use crate::shutdown::PipelineState;
    use crate::test_support::{make_sequencer, wait_for_condition, RecordingStorage, StaticTrigger};
    use crate::upload_pool::UploadOutcome;
    use crate::PipelineError;
    use logroll_core::CompressionMode;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    /// Test: orderly close compresses and uploads the active file
    ///
    /// Flow
    /// - active file with content, gz compression, no rollover in flight
    /// - close the sequencer
    ///
    /// Expected
    /// - report names `<active>.gz` with an `Uploaded` outcome, nothing timed out
    /// - storage saw the compressed file under its base name and was stopped
    /// - state ends as `Stopped`
    #[tokio::test]
    async fn test_close_uploads_active_file() {
        let tmp = TempDir::new().expect("tmpdir");
        let active = tmp.path().join("app.log");
        std::fs::write(&active, b"last lines\n").unwrap();

        let storage = RecordingStorage::new();
        let (_coordinator, sequencer) =
            make_sequencer(CompressionMode::Gz, storage.clone(), 2, Duration::from_secs(5));
        assert_eq!(sequencer.state(), PipelineState::Running);

        let report = sequencer
            .close(&StaticTrigger {
                active: Some(active.clone()),
            })
            .await
            .expect("first close runs");

        let compressed = tmp.path().join("app.log.gz");
        assert_eq!(report.final_file, Some(compressed.clone()));
        assert_eq!(report.final_outcome, Some(UploadOutcome::Uploaded));
        assert!(!report.timed_out);
        assert!(!report.forced);

        let puts = storage.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].key, "app.log.gz");
        assert_eq!(puts[0].file, compressed);
        assert!(!active.exists());
        assert!(storage.is_stopped());
        assert_eq!(sequencer.state(), PipelineState::Stopped);
    }

    /// Test: close runs once
    ///
    /// Expected
    /// - the second call returns `None` and uploads nothing more
    #[tokio::test]
    async fn test_close_is_idempotent() {
        let tmp = TempDir::new().expect("tmpdir");
        let active = tmp.path().join("app.log");
        std::fs::write(&active, b"x").unwrap();

        let storage = RecordingStorage::new();
        let (_coordinator, sequencer) =
            make_sequencer(CompressionMode::None, storage.clone(), 1, Duration::from_secs(5));
        let trigger = StaticTrigger {
            active: Some(active),
        };

        assert!(sequencer.close(&trigger).await.is_some());
        assert!(sequencer.close(&trigger).await.is_none());
        assert_eq!(storage.puts().len(), 1);
    }

    /// Test: the drain wait is bounded
    ///
    /// Purpose
    /// - A rollover whose compression never completes must not block exit past the timeout
    ///
    /// Expected
    /// - close returns well before the test deadline with `timed_out` set
    /// - the active file is still uploaded
    #[tokio::test]
    async fn test_close_times_out_on_stuck_chain() {
        let tmp = TempDir::new().expect("tmpdir");
        let rolled = tmp.path().join("app.1.log");
        let active = tmp.path().join("app.log");
        std::fs::write(&rolled, b"rolled").unwrap();
        std::fs::write(&active, b"active").unwrap();

        let storage = RecordingStorage::new();
        let (coordinator, sequencer) = make_sequencer(
            CompressionMode::Gz,
            storage.clone(),
            1,
            Duration::from_millis(200),
        );
        coordinator.trigger_upload(
            Some(rolled),
            Some(CompressionHandle::new(futures::future::pending::<
                Result<std::path::PathBuf, PipelineError>,
            >())),
        );

        let started = Instant::now();
        let report = sequencer
            .close(&StaticTrigger {
                active: Some(active),
            })
            .await
            .expect("close runs");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(report.timed_out);
        assert_eq!(report.final_outcome, Some(UploadOutcome::Uploaded));
        assert_eq!(storage.puts().len(), 1);
        assert_eq!(storage.puts()[0].key, "app.log.gz");
    }

    /// Test: failing to locate the active file forces termination
    ///
    /// Flow
    /// - one upload blocked inside put by a gate, two more queued
    /// - close with a trigger that cannot report its active file
    ///
    /// Expected
    /// - report is `forced` with both queued uploads discarded
    /// - the pool rejects new work and storage is stopped
    #[tokio::test]
    async fn test_close_failure_forces_termination() {
        let tmp = TempDir::new().expect("tmpdir");
        let gate = Arc::new(Semaphore::new(0));
        let storage = RecordingStorage::gated(gate.clone());
        let (coordinator, sequencer) =
            make_sequencer(CompressionMode::None, storage.clone(), 1, Duration::from_secs(5));

        let mut handles = Vec::new();
        for i in 0..3 {
            let file = tmp.path().join(format!("r{}.log", i));
            std::fs::write(&file, b"r").unwrap();
            handles.push(coordinator.pool().submit(file));
        }
        let s = storage.clone();
        assert!(wait_for_condition(move || s.active() == 1, 2000, 10).await);

        let report = sequencer
            .close(&StaticTrigger { active: None })
            .await
            .expect("close runs");
        assert!(report.forced);
        assert_eq!(report.discarded, 2);
        assert_eq!(report.final_file, None);
        assert!(storage.is_stopped());
        assert_eq!(sequencer.state(), PipelineState::Stopped);

        let late = tmp.path().join("late.log");
        std::fs::write(&late, b"late").unwrap();
        assert!(matches!(
            coordinator.pool().try_submit(late),
            Err(PipelineError::Closed)
        ));

        gate.add_permits(1);
        let mut outcomes = Vec::new();
        for h in handles {
            outcomes.push(h.wait().await);
        }
        assert_eq!(outcomes[0], UploadOutcome::Uploaded);
        assert!(outcomes[1..].iter().all(|o| *o == UploadOutcome::Discarded));
    }
}
