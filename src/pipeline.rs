//! # Clustering pipeline
//! One batch pass: Source → Extractor → Normalizer → Assigner → Sink.
//! Every intermediate lives only for the duration of [`ClusteringPipeline::run`].

use anyhow::{Context, Result};
use metrics::gauge;
use std::sync::Arc;

use crate::cluster::KMeans;
use crate::features::extract_batch;
use crate::ingest::fetch_batch;
use crate::ingest::types::MessageSource;
use crate::normalize::fit_transform;
use crate::sink::{label_batch, persist, DatabaseSink, DbWrite, FileSink};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No messages from any channel; not an error.
    Empty,
    Completed {
        rows: usize,
        clusters: usize,
        inertia: f64,
        database: DbWrite,
    },
}

pub struct ClusteringPipeline {
    source: Arc<dyn MessageSource>,
    channels: Vec<String>,
    page_limit: usize,
    kmeans: KMeans,
    file: Arc<dyn FileSink>,
    db: Option<Arc<dyn DatabaseSink>>,
}

impl ClusteringPipeline {
    pub fn new(
        source: Arc<dyn MessageSource>,
        channels: Vec<String>,
        kmeans: KMeans,
        file: Arc<dyn FileSink>,
    ) -> Self {
        Self {
            source,
            channels,
            page_limit: crate::ingest::DEFAULT_PAGE_LIMIT,
            kmeans,
            file,
            db: None,
        }
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    pub fn with_database(mut self, db: Option<Arc<dyn DatabaseSink>>) -> Self {
        self.db = db;
        self
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        tracing::info!(channels = self.channels.len(), "starting slack clustering pipeline");

        let (batch, _report) =
            fetch_batch(self.source.as_ref(), &self.channels, self.page_limit).await;
        if batch.is_empty() {
            tracing::warn!("no messages fetched from any channel, ending run early");
            return Ok(RunOutcome::Empty);
        }

        let features = extract_batch(&batch);
        let scaled = fit_transform(&features);
        tracing::info!(rows = scaled.len(), "preprocessing complete");

        tracing::info!(k = self.kmeans.k, "running k-means");
        let clustering = self.kmeans.fit(&scaled).context("clustering batch")?;
        tracing::info!(inertia = clustering.inertia, "k-means complete");
        gauge!("pipeline_cluster_inertia").set(clustering.inertia);

        let rows = label_batch(batch, &clustering.labels)?;
        let report = persist(&rows, self.file.as_ref(), self.db.as_deref()).await?;

        tracing::info!(rows = report.file_rows, "slack clustering pipeline finished");
        Ok(RunOutcome::Completed {
            rows: report.file_rows,
            clusters: self.kmeans.k,
            inertia: clustering.inertia,
            database: report.database,
        })
    }
}

#[async_trait::async_trait]
impl crate::orchestrator::Job for ClusteringPipeline {
    async fn run(&self) -> Result<RunOutcome> {
        ClusteringPipeline::run(self).await
    }

    fn name(&self) -> &str {
        "slack_kmeans_clustering"
    }
}
