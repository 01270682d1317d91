// src/scheduler.rs
//! Interval trigger for an [`Orchestrator`]. Overlapping ticks are skipped.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::orchestrator::{Orchestrator, RunError};

pub const ENV_SCHEDULE_INTERVAL: &str = "SCHEDULE_INTERVAL_SECS";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerCfg {
    pub interval_secs: u64,
}

/// Parse the interval setting. Unset or blank means run once; anything else
/// must be a positive whole number of seconds.
pub fn interval_from(raw: Option<&str>) -> Result<Option<SchedulerCfg>> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let interval_secs: u64 = raw
        .parse()
        .with_context(|| format!("{ENV_SCHEDULE_INTERVAL} must be whole seconds, got {raw:?}"))?;
    if interval_secs == 0 {
        return Err(anyhow!("{ENV_SCHEDULE_INTERVAL} must be greater than zero"));
    }
    Ok(Some(SchedulerCfg { interval_secs }))
}

pub fn interval_from_env() -> Result<Option<SchedulerCfg>> {
    match std::env::var(ENV_SCHEDULE_INTERVAL) {
        Ok(v) => interval_from(Some(&v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {ENV_SCHEDULE_INTERVAL}")),
    }
}

/// Fire once per interval (first tick immediately). A tick that lands while a
/// run is still retrying is skipped; failures are logged and the loop goes on.
pub fn spawn_interval_scheduler(cfg: SchedulerCfg, orch: Arc<Orchestrator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let orch = Arc::clone(&orch);
            // Spawned so a long retry chain cannot hold the ticker.
            tokio::spawn(async move {
                match orch.trigger().await {
                    Ok(outcome) => tracing::info!(target: "scheduler", ?outcome, "scheduled run finished"),
                    Err(RunError::AlreadyRunning) => {
                        tracing::warn!(target: "scheduler", "tick skipped, run already active")
                    }
                    Err(e) => tracing::error!(target: "scheduler", error = %e, "scheduled run failed"),
                }
            });
        }
    })
}
