mod agent_metrics;
mod args_parse;
mod service_configuration;

use std::{fs::read_to_string, path::Path, sync::Arc};

use crate::{
    agent_metrics::init_metrics,
    args_parse::Args,
    service_configuration::{parse_addr, LoadConfiguration, ServiceConfiguration},
};

use anyhow::{Context, Result};
use clap::Parser;
use logroll_upload::{select_storage, RollingFile, UploadPipeline};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load the configuration from the specified YAML file
    let config_content = read_to_string(Path::new(&args.config_file))
        .context(format!("Failed to read config file {}", args.config_file))?;
    let load_config: LoadConfiguration = serde_yaml::from_str(&config_content)?;
    let mut service_config: ServiceConfiguration = load_config.try_into()?;

    if let Some(prom_exporter) = args.prom_exporter {
        service_config.prom_exporter = Some(parse_addr(&prom_exporter)?);
    }
    if let Some(bucket) = args.bucket {
        service_config.upload.bucket = bucket;
    }

    init_metrics(service_config.prom_exporter)?;

    let storage = select_storage(
        service_config.upload.enable_upload,
        service_config.storage.clone(),
    )?;
    info!(
        "Initializing upload pipeline with {} storage",
        storage.provider()
    );
    let pipeline = Arc::new(
        UploadPipeline::start(
            &service_config.upload,
            service_config.rolling.compression,
            storage,
        )
        .await?,
    );
    let rolling = RollingFile::open(service_config.rolling.clone(), pipeline).await?;
    info!(
        "Appending stdin to {}",
        rolling.active_file().display()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, closing rolling file");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(mut line)) => {
                    line.push('\n');
                    rolling.write(line).await?;
                }
                Ok(None) => {
                    info!("stdin closed, closing rolling file");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin, closing rolling file");
                    break;
                }
            },
        }
    }

    if let Some(report) = rolling.close().await? {
        info!(
            final_file = ?report.final_file,
            outcome = ?report.final_outcome,
            timed_out = report.timed_out,
            forced = report.forced,
            discarded = report.discarded,
            "logroll agent stopped"
        );
    }
    Ok(())
}
