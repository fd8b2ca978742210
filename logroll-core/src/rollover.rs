use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Compression applied to a rolled file before it is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    #[default]
    None,
    Gz,
    Zstd,
}

impl CompressionMode {
    pub fn name(&self) -> &'static str {
        match self {
            CompressionMode::None => "NONE",
            CompressionMode::Gz => "GZ",
            CompressionMode::Zstd => "ZSTD",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, CompressionMode::None)
    }

    /// File extension appended to compressed files, `None` when disabled.
    pub fn extension(&self) -> Option<String> {
        if self.is_enabled() {
            Some(self.name().to_lowercase())
        } else {
            None
        }
    }

    /// Name of the file produced by compressing `source`: `source + "." + ext`,
    /// or `source` unchanged when compression is disabled.
    pub fn compressed_name(&self, source: &Path) -> PathBuf {
        match self.extension() {
            Some(ext) => {
                let mut name: OsString = source.as_os_str().to_owned();
                name.push(".");
                name.push(ext);
                PathBuf::from(name)
            }
            None => source.to_path_buf(),
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(CompressionMode::None),
            "gz" | "gzip" => Ok(CompressionMode::Gz),
            "zstd" | "zst" => Ok(CompressionMode::Zstd),
            other => Err(format!("unknown compression mode: {}", other)),
        }
    }
}

/// Emitted once per rollover by the rotation trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverEvent {
    /// The file that was just closed; absent when nothing was written yet.
    pub elapsed_file_name: Option<PathBuf>,
    /// The file now receiving writes.
    pub active_file_name: PathBuf,
}

/// What the pipeline needs to know about the rotation mechanism.
pub trait RotationTrigger: Send + Sync {
    /// Name of the file closed by the most recent rollover, if any.
    fn elapsed_periods_file_name(&self) -> Option<PathBuf>;

    /// Name of the file currently being written.
    fn active_file_name(&self) -> std::io::Result<PathBuf>;
}
