// src/ingest/slack.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::{MessageSource, RawMessage};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Deserialize)]
struct SlackMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    reply_count: Option<u32>,
    #[serde(default)]
    reactions: Vec<SlackReaction>,
}

#[derive(Debug, Deserialize)]
struct SlackReaction {
    #[serde(default)]
    count: u32,
}

impl SlackMessage {
    fn into_raw(self, channel_id: &str) -> RawMessage {
        RawMessage {
            channel_id: channel_id.to_string(),
            author_id: self.user.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            timestamp: self.ts.unwrap_or_default(),
            thread_reply_count: self.reply_count.unwrap_or(0),
            reaction_total: self
                .reactions
                .iter()
                .fold(0u32, |acc, r| acc.saturating_add(r.count)),
        }
    }
}

/// Parse a `conversations.history` body. `ok: false` becomes an error
/// carrying Slack's error code (e.g. `not_in_channel`).
pub fn parse_history(channel_id: &str, body: &str) -> Result<Vec<RawMessage>> {
    let rsp: HistoryResponse =
        serde_json::from_str(body).context("parsing conversations.history json")?;
    if !rsp.ok {
        let code = rsp.error.unwrap_or_else(|| "unknown_error".to_string());
        return Err(anyhow!("slack api error for channel {channel_id}: {code}"));
    }
    Ok(rsp
        .messages
        .into_iter()
        .map(|m| m.into_raw(channel_id))
        .collect())
}

/// Pulls channel history from the Slack Web API with a bot token.
#[derive(Clone)]
pub struct SlackHistorySource {
    token: String,
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl SlackHistorySource {
    pub fn new(token: String) -> Self {
        Self {
            token,
            base_url: DEFAULT_SLACK_API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Share a preconfigured HTTP client (proxy, pool settings).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl MessageSource for SlackHistorySource {
    async fn fetch(&self, channel_id: &str, limit: usize) -> Result<Vec<RawMessage>> {
        let t0 = std::time::Instant::now();
        let url = format!("{}/conversations.history", self.base_url);
        let limit_s = limit.to_string();

        let rsp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("channel", channel_id), ("limit", limit_s.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("conversations.history request for {channel_id}"))?;

        if rsp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow!("slack rate limited channel {channel_id}"));
        }
        let rsp = rsp
            .error_for_status()
            .with_context(|| format!("conversations.history non-2xx for {channel_id}"))?;
        let body = rsp.text().await.context("read conversations.history body")?;

        let out = parse_history(channel_id, &body)?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("pipeline_fetch_ms").record(ms);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "Slack"
    }
}
