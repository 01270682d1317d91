// src/ingest/mod.rs
pub mod slack;
pub mod types;

use crate::ingest::types::{MessageSource, RawMessage};
use metrics::counter;

/// Default page size per channel (most recent N messages).
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Per-channel fetch summary, useful for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub fetched: Vec<(String, usize)>,
    pub failed: Vec<String>,
}

/// Fetch every channel independently and union the results.
/// A failing channel is logged and skipped; it never aborts the batch.
pub async fn fetch_batch(
    source: &dyn MessageSource,
    channels: &[String],
    limit: usize,
) -> (Vec<RawMessage>, FetchReport) {
    crate::metrics::ensure_metrics_described();

    let mut batch = Vec::new();
    let mut report = FetchReport::default();

    for channel in channels {
        match source.fetch(channel, limit).await {
            Ok(mut msgs) => {
                // Guard against adapters that ignore the page size.
                msgs.truncate(limit);
                tracing::info!(
                    channel = channel.as_str(),
                    fetched = msgs.len(),
                    source = source.name(),
                    "fetched channel history"
                );
                counter!("pipeline_messages_fetched_total").increment(msgs.len() as u64);
                report.fetched.push((channel.clone(), msgs.len()));
                batch.append(&mut msgs);
            }
            Err(e) => {
                tracing::error!(
                    channel = channel.as_str(),
                    error = %format!("{e:#}"),
                    source = source.name(),
                    "channel fetch failed, skipping"
                );
                counter!("pipeline_channel_errors_total").increment(1);
                report.failed.push(channel.clone());
            }
        }
    }

    tracing::info!(total = batch.len(), "total messages fetched");
    (batch, report)
}
