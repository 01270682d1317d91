use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{Alert, Notifier};
use crate::ingest::slack::DEFAULT_SLACK_API_BASE;

/// Posts alerts to a channel via `chat.postMessage` with the bot token.
pub struct SlackAlertNotifier {
    token: String,
    channel: String,
    base_url: String,
    client: Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackAlertNotifier {
    pub fn new(token: String, channel: String) -> Self {
        Self {
            token,
            channel,
            base_url: DEFAULT_SLACK_API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
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

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for SlackAlertNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let body = serde_json::json!({ "channel": self.channel, "text": alert.chat_text() });

        let rsp: PostMessageResponse = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("chat.postMessage request to {}", self.channel))?
            .error_for_status()
            .with_context(|| format!("chat.postMessage non-2xx for {}", self.channel))?
            .json()
            .await
            .context("chat.postMessage response json")?;

        if !rsp.ok {
            return Err(anyhow!(
                "chat.postMessage to {} failed: {}",
                self.channel,
                rsp.error.unwrap_or_else(|| "unknown_error".into())
            ));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "slack"
    }
}
