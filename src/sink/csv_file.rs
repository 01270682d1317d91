// src/sink/csv_file.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{ClusterRecord, FileSink};

pub const DEFAULT_OUTPUT_PATH: &str = "data/slack_clusters.csv";

/// Writes the batch as CSV with a header row. Each write replaces the file
/// (written to a sibling temp file, then renamed over the target).
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn encode_csv(rows: &[ClusterRecord]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        wtr.write_record(super::COLUMNS).context("write csv header")?;
    }
    for r in rows {
        wtr.serialize(r).context("serialize csv row")?;
    }
    wtr.into_inner().context("flush csv buffer")
}

#[async_trait::async_trait]
impl FileSink for CsvFileSink {
    async fn write_table(&self, rows: &[ClusterRecord]) -> Result<()> {
        let bytes = encode_csv(rows)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create output dir {}", dir.display()))?;
        }

        let tmp = self.path.with_extension("csv.tmp");
        fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
