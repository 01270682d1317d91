// src/ingest/types.rs
use anyhow::Result;

/// One message as pulled from a channel. Immutable once fetched.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct RawMessage {
    pub channel_id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: String, // Slack `ts`, kept verbatim
    #[serde(default)]
    pub thread_reply_count: u32,
    #[serde(default)]
    pub reaction_total: u32,
}

/// A data source that returns the most recent messages of one channel.
#[async_trait::async_trait]
pub trait MessageSource: Send + Sync {
    /// Single bounded fetch of at most `limit` messages from `channel_id`.
    async fn fetch(&self, channel_id: &str, limit: usize) -> Result<Vec<RawMessage>>;
    fn name(&self) -> &'static str;
}
