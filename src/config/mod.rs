// src/config/mod.rs
//! Explicit run configuration, built once at startup and handed to each
//! component. Nothing here reads process state after construction.

pub mod settings;

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use crate::cluster::{KMeans, DEFAULT_CLUSTER_COUNT};
use crate::orchestrator::RetryPolicy;
pub use settings::{ClusteringSettings, FileSettings, RetrySettings};

pub const ENV_SLACK_TOKEN: &str = "SLACK_BOT_TOKEN";
pub const ENV_SLACK_CHANNELS: &str = "SLACK_CHANNELS";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_ALERT_CHANNEL: &str = "SLACK_ALERT_CHANNEL";
pub const ENV_CLUSTER_COUNT: &str = "CLUSTER_COUNT";

pub const ENV_SMTP_HOST: &str = "SMTP_HOST";
pub const ENV_SMTP_USER: &str = "SMTP_USER";
pub const ENV_SMTP_PASS: &str = "SMTP_PASS";
pub const ENV_EMAIL_FROM: &str = "NOTIFY_EMAIL_FROM";
pub const ENV_EMAIL_TO: &str = "NOTIFY_EMAIL_TO";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub source_auth_token: String,
    pub channels: Vec<String>,
    /// `None` disables database persistence.
    pub database_url: Option<String>,
    /// `None` disables chat alerts.
    pub alert_channel_id: Option<String>,
    pub cluster_count: usize,
    pub page_limit: usize,
    pub output_path: PathBuf,
    pub table_name: String,
    pub clustering: ClusteringSettings,
    pub retry: RetrySettings,
    /// `None` disables email alerts.
    pub smtp: Option<SmtpConfig>,
}

/// Split a comma list, trim entries, drop blanks and repeats (order kept).
pub fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in raw.split(',') {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|x| x == t) {
            out.push(t.to_string());
        }
    }
    out
}

impl PipelineConfig {
    /// Read from the process environment plus the optional settings file.
    pub fn from_env() -> Result<Self> {
        let lookup = |k: &str| std::env::var(k).ok();
        let settings = FileSettings::load_default(lookup)?;
        Self::from_lookup(lookup, settings)
    }

    /// Build from any key lookup; blank values count as missing.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        settings: FileSettings,
    ) -> Result<Self> {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let source_auth_token = get(ENV_SLACK_TOKEN)
            .ok_or_else(|| anyhow!("{ENV_SLACK_TOKEN} environment variable is required"))?;

        let channels = get(ENV_SLACK_CHANNELS)
            .map(|raw| split_list(&raw))
            .unwrap_or_default();
        if channels.is_empty() {
            return Err(anyhow!("{ENV_SLACK_CHANNELS} environment variable is required"));
        }

        let cluster_count = match get(ENV_CLUSTER_COUNT) {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("{ENV_CLUSTER_COUNT} must be a positive integer"))?,
            None => DEFAULT_CLUSTER_COUNT,
        };
        if cluster_count == 0 {
            return Err(anyhow!("{ENV_CLUSTER_COUNT} must be at least 1"));
        }

        let smtp = match (
            get(ENV_SMTP_HOST),
            get(ENV_SMTP_USER),
            get(ENV_SMTP_PASS),
            get(ENV_EMAIL_FROM),
        ) {
            (Some(host), Some(user), Some(pass), Some(from)) => {
                let to = get(ENV_EMAIL_TO)
                    .map(|raw| split_list(&raw))
                    .unwrap_or_else(|| settings.alerts.email_to.clone());
                Some(SmtpConfig {
                    host,
                    user,
                    pass,
                    from,
                    to,
                })
            }
            _ => None,
        };

        Ok(Self {
            source_auth_token,
            channels,
            database_url: get(ENV_DATABASE_URL),
            alert_channel_id: get(ENV_ALERT_CHANNEL),
            cluster_count,
            page_limit: settings.page_limit,
            output_path: settings.output_path,
            table_name: settings.table_name,
            clustering: settings.clustering,
            retry: settings.retry,
            smtp,
        })
    }

    pub fn kmeans(&self) -> KMeans {
        KMeans::new(self.cluster_count)
            .with_seed(self.clustering.seed)
            .with_restarts(self.clustering.restarts)
            .with_max_iterations(self.clustering.max_iterations)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_settings(&self.retry)
    }
}
