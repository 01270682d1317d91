// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_messages_fetched_total",
            "Messages fetched across all channels."
        );
        describe_counter!(
            "pipeline_channel_errors_total",
            "Channel fetches that failed and were skipped."
        );
        describe_histogram!("pipeline_fetch_ms", "Channel history fetch time in milliseconds.");
        describe_counter!("pipeline_runs_total", "Scheduled runs started.");
        describe_counter!("pipeline_retries_total", "Run attempts retried after a failure.");
        describe_counter!(
            "pipeline_run_failures_total",
            "Runs that failed after exhausting retries."
        );
        describe_counter!("pipeline_alerts_sent_total", "Failure alerts delivered.");
        describe_counter!(
            "pipeline_db_write_failures_total",
            "Best-effort database writes that failed."
        );
        describe_gauge!("pipeline_cluster_inertia", "Inertia of the latest clustering.");
        describe_gauge!(
            "pipeline_last_success_ts",
            "Unix ts of the last successful run."
        );
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must be called from inside a Tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    Ok(())
}
