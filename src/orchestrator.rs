//! # Run Orchestrator
//! Explicit state machine around one pipeline run:
//! `Idle → Running → Succeeded | Failed`.
//!
//! A failed attempt is retried from scratch with exponential backoff
//! (`base * 2^(n-1)`, capped). After the retry budget is spent, one email
//! and one chat alert are dispatched and the failure is returned to the caller.
//! Only one run may be active per orchestrator; an overlapping trigger gets
//! [`RunError::AlreadyRunning`].

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::RetrySettings;
use crate::notify::{Alert, AlertMux};
use crate::pipeline::RunOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error("run failed after {attempts} attempt(s): {detail}")]
    Exhausted { attempts: u32, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(s: &RetrySettings) -> Self {
        Self {
            retries: s.retries,
            base_delay: Duration::from_secs(s.base_delay_secs),
            max_delay: Duration::from_secs(s.max_delay_secs),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Timer used between attempts; swapped out in tests.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// A unit of work the orchestrator can run and retry.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> Result<RunOutcome>;
    fn name(&self) -> &str;
}

pub struct Orchestrator {
    job: Arc<dyn Job>,
    policy: RetryPolicy,
    alerts: AlertMux,
    sleeper: Arc<dyn Sleeper>,
    state: Mutex<RunState>,
    gate: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub fn new(job: Arc<dyn Job>, policy: RetryPolicy, alerts: AlertMux) -> Self {
        Self {
            job,
            policy,
            alerts,
            sleeper: Arc::new(TokioSleeper),
            state: Mutex::new(RunState::Idle),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, s: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = s;
    }

    /// Schedule trigger: run the job with retries; alert and propagate on
    /// terminal failure.
    pub async fn trigger(&self) -> Result<RunOutcome, RunError> {
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::warn!(job = self.job.name(), "previous run still active, skipping trigger");
            return Err(RunError::AlreadyRunning);
        };

        crate::metrics::ensure_metrics_described();
        counter!("pipeline_runs_total").increment(1);
        self.set_state(RunState::Running);

        let max_attempts = self.policy.retries.saturating_add(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            tracing::info!(job = self.job.name(), attempt, max_attempts, "run attempt started");

            match self.job.run().await {
                Ok(outcome) => {
                    self.set_state(RunState::Succeeded);
                    gauge!("pipeline_last_success_ts").set(Utc::now().timestamp() as f64);
                    tracing::info!(job = self.job.name(), attempt, "run succeeded");
                    return Ok(outcome);
                }
                Err(e) => {
                    let detail = format!("{e:#}");
                    self.set_state(RunState::Failed);
                    tracing::error!(job = self.job.name(), attempt, error = %detail, "run attempt failed");

                    if attempt >= max_attempts {
                        counter!("pipeline_run_failures_total").increment(1);
                        let alert = Alert::run_failed(detail.clone(), attempt);
                        let report = self.alerts.dispatch(&alert).await;
                        tracing::error!(
                            job = self.job.name(),
                            attempts = attempt,
                            email = ?report.email,
                            chat = ?report.chat,
                            "retries exhausted"
                        );
                        return Err(RunError::Exhausted {
                            attempts: attempt,
                            detail,
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    counter!("pipeline_retries_total").increment(1);
                    tracing::warn!(
                        job = self.job.name(),
                        retry = attempt,
                        delay_secs = delay.as_secs(),
                        "retrying after backoff"
                    );
                    self.sleeper.sleep(delay).await;
                    self.set_state(RunState::Running);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_secs(300));
        assert_eq!(p.delay_for(2), Duration::from_secs(600));
        assert_eq!(p.delay_for(3), Duration::from_secs(1200));
        assert_eq!(p.delay_for(4), Duration::from_secs(1800));
        assert_eq!(p.delay_for(40), Duration::from_secs(1800));
    }

    #[test]
    fn huge_base_does_not_overflow() {
        let p = RetryPolicy {
            retries: 3,
            base_delay: Duration::from_secs(u64::MAX / 2),
            max_delay: Duration::from_secs(u64::MAX / 2),
        };
        assert_eq!(p.delay_for(5), p.max_delay);
    }
}
