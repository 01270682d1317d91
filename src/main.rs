//! Slack Cluster Pipeline: binary entrypoint
//! Loads configuration, then either runs once (external scheduler) or keeps
//! an interval scheduler alive. Exits non-zero when a run fails for good.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use slack_cluster_pipeline::bootstrap::build_orchestrator;
use slack_cluster_pipeline::scheduler::{interval_from_env, spawn_interval_scheduler};
use slack_cluster_pipeline::PipelineConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = PipelineConfig::from_env().context("loading pipeline configuration")?;
    let schedule = interval_from_env().context("loading schedule configuration")?;

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr.parse().context("METRICS_ADDR must be host:port")?;
        slack_cluster_pipeline::metrics::install_prometheus(addr)?;
        tracing::info!(%addr, "prometheus exporter listening");
    }

    let orch = Arc::new(build_orchestrator(&cfg));

    match schedule {
        Some(sched) => {
            tracing::info!(interval_secs = sched.interval_secs, "running as interval scheduler");
            spawn_interval_scheduler(sched, orch)
                .await
                .context("scheduler task ended")?;
            Ok(())
        }
        None => {
            let outcome = orch.trigger().await?;
            tracing::info!(?outcome, "run complete");
            Ok(())
        }
    }
}
