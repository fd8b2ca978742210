use anyhow::{Context, Result};
use logroll_upload::upload_metrics::{Metric, COUNTERS, HISTOGRAMS};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub(crate) fn init_metrics(prom_addr: Option<SocketAddr>) -> Result<()> {
    info!("initializing metrics exporter");

    if let Some(addr) = prom_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus recorder")?;
        info!("prometheus exporter listening on {}", addr);
    }

    for metric in COUNTERS {
        register_counter(metric)
    }

    for metric in HISTOGRAMS {
        register_histogram(metric)
    }
    Ok(())
}

fn register_counter(metric: &Metric) {
    metrics::describe_counter!(metric.name, metric.description);
    let _counter = metrics::counter!(metric.name);
}

fn register_histogram(metric: &Metric) {
    metrics::describe_histogram!(metric.name, metric.description);
    let _histogram = metrics::histogram!(metric.name);
}
