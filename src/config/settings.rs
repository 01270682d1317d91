// src/config/settings.rs
//! Optional TOML file with the non-secret knobs. Absent file = defaults.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cluster::{DEFAULT_MAX_ITERATIONS, DEFAULT_RESTARTS, DEFAULT_SEED};
use crate::ingest::DEFAULT_PAGE_LIMIT;
use crate::sink::csv_file::DEFAULT_OUTPUT_PATH;
use crate::sink::sql::DEFAULT_TABLE_NAME;

pub const ENV_SETTINGS_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_SETTINGS_PATH: &str = "config/pipeline.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub output_path: PathBuf,
    pub table_name: String,
    pub page_limit: usize,
    pub clustering: ClusteringSettings,
    pub retry: RetrySettings,
    pub alerts: AlertSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusteringSettings {
    pub seed: u64,
    pub restarts: usize,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub email_to: Vec<String>,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            clustering: ClusteringSettings::default(),
            retry: RetrySettings::default(),
            alerts: AlertSettings::default(),
        }
    }
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            restarts: DEFAULT_RESTARTS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        // 3 retries, 5 min doubling, capped at 30 min
        Self {
            retries: 3,
            base_delay_secs: 300,
            max_delay_secs: 1800,
        }
    }
}

impl FileSettings {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline settings from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut v: FileSettings = toml::from_str(s)?;
        v.page_limit = v.page_limit.max(1);
        v.clustering.restarts = v.clustering.restarts.max(1);
        v.clustering.max_iterations = v.clustering.max_iterations.max(1);
        if v.retry.max_delay_secs < v.retry.base_delay_secs {
            std::mem::swap(&mut v.retry.max_delay_secs, &mut v.retry.base_delay_secs);
        }
        Ok(v)
    }

    /// 1) `$PIPELINE_CONFIG_PATH` (must exist)
    /// 2) `config/pipeline.toml`
    /// 3) built-in defaults
    pub fn load_default(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(p) = lookup(ENV_SETTINGS_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("PIPELINE_CONFIG_PATH points to non-existent path"));
        }
        let fallback = PathBuf::from(DEFAULT_SETTINGS_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        Ok(Self::default())
    }
}
