#![allow(dead_code)]

use flate2::read::GzDecoder;
use logroll_core::RotationTrigger;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Decompress a gz object written by the pipeline.
pub fn gunzip(path: &Path) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(std::fs::File::open(path).expect("open object"))
        .read_to_end(&mut out)
        .expect("gunzip");
    out
}

/// Poll until `path` exists or `timeout` elapses.
pub async fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    path.exists()
}

/// Rotation trigger that only knows its active file.
pub struct ActiveOnly(pub PathBuf);

impl RotationTrigger for ActiveOnly {
    fn elapsed_periods_file_name(&self) -> Option<PathBuf> {
        None
    }

    fn active_file_name(&self) -> std::io::Result<PathBuf> {
        Ok(self.0.clone())
    }
}
