use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudBackend {
    S3,
    Gcs,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalBackend {
    Fs,
    Memory,
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Cloud backends hosted out of process (S3, GCS). The bucket comes from each put.
    Cloud {
        backend: CloudBackend,
        /// Key prefix inside the bucket, e.g. "logs/prod"; may be empty
        root: String,
        /// Optional backend-specific options (endpoint, region, credentials, etc.)
        options: HashMap<String, String>,
    },
    /// Local backends colocated with the process (fs, memory)
    Local {
        backend: LocalBackend,
        /// For fs: an absolute directory like file:///var/lib/logroll or /var/lib/logroll,
        /// each bucket becomes a sub-directory.
        /// For memory: a logical namespace used as a key prefix.
        root: String,
    },
}

impl BackendConfig {
    pub fn provider(&self) -> &'static str {
        match self {
            BackendConfig::Cloud {
                backend: CloudBackend::S3,
                ..
            } => "s3",
            BackendConfig::Cloud {
                backend: CloudBackend::Gcs,
                ..
            } => "gcs",
            BackendConfig::Local {
                backend: LocalBackend::Fs,
                ..
            } => "fs",
            BackendConfig::Local {
                backend: LocalBackend::Memory,
                ..
            } => "memory",
        }
    }
}

pub(crate) fn split_fs_root(uri_or_path: &str) -> String {
    // Accept file:///abs/path or /abs/path
    uri_or_path
        .strip_prefix("file://")
        .unwrap_or(uri_or_path)
        .to_string()
}

pub(crate) fn normalize_prefix(p: &str) -> String {
    p.trim_matches('/').to_string()
}
