use anyhow::{Context, Result};
use logroll_upload::{BackendConfig, CloudBackend, LocalBackend, RollingConfig, UploadConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;

/// configuration settings loaded from the config file
#[derive(Debug, Deserialize)]
pub(crate) struct LoadConfiguration {
    /// Rolling file (active file, naming pattern, compression)
    pub(crate) rolling: RollingConfig,
    /// Upload pipeline settings
    pub(crate) upload: UploadConfig,
    /// Object store, required when `upload.enable_upload` is set
    #[serde(default)]
    pub(crate) storage: Option<StorageConfig>,
    /// Prometheus exporter address
    #[serde(default)]
    pub(crate) prom_exporter: Option<String>,
}

/// Object store backends selectable from the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StorageKind {
    S3,
    Gcs,
    Fs,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StorageConfig {
    pub(crate) backend: StorageKind,
    /// Key prefix for cloud backends, directory for fs, namespace for memory
    #[serde(default)]
    pub(crate) root: String,
    /// Backend specific options (endpoint, region, access_key, secret_key, credential_file)
    #[serde(default)]
    pub(crate) options: HashMap<String, String>,
}

impl From<StorageConfig> for BackendConfig {
    fn from(cfg: StorageConfig) -> Self {
        match cfg.backend {
            StorageKind::S3 => BackendConfig::Cloud {
                backend: CloudBackend::S3,
                root: cfg.root,
                options: cfg.options,
            },
            StorageKind::Gcs => BackendConfig::Cloud {
                backend: CloudBackend::Gcs,
                root: cfg.root,
                options: cfg.options,
            },
            StorageKind::Fs => BackendConfig::Local {
                backend: LocalBackend::Fs,
                root: cfg.root,
            },
            StorageKind::Memory => BackendConfig::Local {
                backend: LocalBackend::Memory,
                root: cfg.root,
            },
        }
    }
}

/// validated agent configuration
#[derive(Debug)]
pub(crate) struct ServiceConfiguration {
    pub(crate) rolling: RollingConfig,
    pub(crate) upload: UploadConfig,
    pub(crate) storage: Option<BackendConfig>,
    pub(crate) prom_exporter: Option<SocketAddr>,
}

impl TryFrom<LoadConfiguration> for ServiceConfiguration {
    type Error = anyhow::Error;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        let prom_exporter = config
            .prom_exporter
            .map(|addr| parse_addr(&addr))
            .transpose()?;

        Ok(ServiceConfiguration {
            rolling: config.rolling,
            upload: config.upload,
            storage: config.storage.map(BackendConfig::from),
            prom_exporter,
        })
    }
}

pub(crate) fn parse_addr(addr: &str) -> Result<SocketAddr> {
    addr.parse()
        .context(format!("Failed to parse into Socket address: {}", addr))
}
