use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "logroll-agent")]
#[command(
    about = "Append stdin lines to a rolling log file and upload every rolled file",
    long_about = None
)]
pub(crate) struct Args {
    /// Path to config file
    #[arg(long)]
    pub(crate) config_file: String,

    /// Prometheus exporter http address, overrides `prom_exporter` from the config file
    #[arg(long)]
    pub(crate) prom_exporter: Option<String>,

    /// Destination bucket, overrides `upload.bucket` from the config file
    #[arg(long)]
    pub(crate) bucket: Option<String>,
}
