// src/sink/mod.rs
//! Result Sink: labeled records go to a flat file (fatal on failure) and,
//! when configured, to a relational table (best-effort). Both writes are
//! full replaces of the previous run's output.

pub mod csv_file;
pub mod sql;

use anyhow::{anyhow, Result};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::features::word_count;
use crate::ingest::types::RawMessage;

/// Output columns, in file/table order.
pub const COLUMNS: [&str; 8] = [
    "channel",
    "user",
    "text",
    "timestamp",
    "thread_replies",
    "reaction_count",
    "word_count",
    "cluster",
];

/// One output row: the raw message plus its cluster label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub timestamp: String,
    pub thread_replies: u32,
    pub reaction_count: u32,
    pub word_count: u32,
    pub cluster: u32,
}

impl ClusterRecord {
    pub fn new(msg: RawMessage, cluster: usize) -> Self {
        let wc = word_count(&msg.text);
        Self {
            channel: msg.channel_id,
            user: msg.author_id,
            text: msg.text,
            timestamp: msg.timestamp,
            thread_replies: msg.thread_reply_count,
            reaction_count: msg.reaction_total,
            word_count: u32::try_from(wc).unwrap_or(u32::MAX),
            cluster: u32::try_from(cluster).unwrap_or(u32::MAX),
        }
    }
}

/// Zip a batch with its labels. Lengths must match exactly.
pub fn label_batch(batch: Vec<RawMessage>, labels: &[usize]) -> Result<Vec<ClusterRecord>> {
    if batch.len() != labels.len() {
        return Err(anyhow!(
            "label count {} does not match batch size {}",
            labels.len(),
            batch.len()
        ));
    }
    Ok(batch
        .into_iter()
        .zip(labels)
        .map(|(m, l)| ClusterRecord::new(m, *l))
        .collect())
}

/// Flat tabular output; a failure here fails the run.
#[async_trait::async_trait]
pub trait FileSink: Send + Sync {
    /// Replace the target contents with `rows`.
    async fn write_table(&self, rows: &[ClusterRecord]) -> Result<()>;
    fn describe(&self) -> String;
}

/// Relational output; failures are logged and never fail the run.
#[async_trait::async_trait]
pub trait DatabaseSink: Send + Sync {
    /// Drop prior rows of the table and insert `rows`.
    async fn write_table(&self, rows: &[ClusterRecord]) -> Result<()>;
    fn table_name(&self) -> &str;
}

/// Outcome of the best-effort database write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbWrite {
    Written(usize),
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub file_rows: usize,
    pub database: DbWrite,
}

/// File write first (propagates), then the independent database write.
pub async fn persist(
    rows: &[ClusterRecord],
    file: &dyn FileSink,
    db: Option<&dyn DatabaseSink>,
) -> Result<PersistReport> {
    file.write_table(rows).await?;
    tracing::info!(rows = rows.len(), target_file = %file.describe(), "clusters saved to file");

    let database = write_database(rows, db).await;
    Ok(PersistReport {
        file_rows: rows.len(),
        database,
    })
}

/// Best-effort database write; never returns an error.
pub async fn write_database(rows: &[ClusterRecord], db: Option<&dyn DatabaseSink>) -> DbWrite {
    let Some(db) = db else {
        tracing::info!("no database configured, skipping database save");
        return DbWrite::Skipped;
    };
    match db.write_table(rows).await {
        Ok(()) => {
            tracing::info!(rows = rows.len(), table = db.table_name(), "clusters saved to database");
            DbWrite::Written(rows.len())
        }
        Err(e) => {
            let detail = format!("{e:#}");
            tracing::error!(table = db.table_name(), error = %detail, "failed to save to database");
            counter!("pipeline_db_write_failures_total").increment(1);
            DbWrite::Failed(detail)
        }
    }
}
