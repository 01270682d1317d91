// src/notify/mod.rs
//! Failure alerts. Every channel is best-effort: a delivery failure is
//! logged and counted, never escalated.

pub mod email;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;

pub const ALERT_SUBJECT: &str = "Slack Clustering Run Failed";

/// Terminal-failure alert; `detail` is the captured error, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub detail: String,
    pub attempts: u32,
    pub ts: DateTime<Utc>,
}

impl Alert {
    pub fn run_failed(detail: impl Into<String>, attempts: u32) -> Self {
        Self {
            subject: ALERT_SUBJECT.to_string(),
            detail: detail.into(),
            attempts,
            ts: Utc::now(),
        }
    }

    pub fn chat_text(&self) -> String {
        format!(":x: Slack clustering run failed!\nError:\n{}", self.detail)
    }

    pub fn email_body(&self) -> String {
        format!(
            "Slack clustering run failed after {} attempt(s).\nTime (UTC): {}\n\nError:\n{}\n",
            self.attempts,
            self.ts.to_rfc3339(),
            self.detail
        )
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;
    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Disabled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertReport {
    pub email: Delivery,
    pub chat: Delivery,
}

/// Email + chat fan-out. A missing channel is reported as `Disabled`.
#[derive(Clone, Default)]
pub struct AlertMux {
    email: Option<Arc<dyn Notifier>>,
    chat: Option<Arc<dyn Notifier>>,
}

impl AlertMux {
    pub fn new(email: Option<Arc<dyn Notifier>>, chat: Option<Arc<dyn Notifier>>) -> Self {
        Self { email, chat }
    }

    pub async fn dispatch(&self, alert: &Alert) -> AlertReport {
        AlertReport {
            email: deliver(self.email.as_deref(), alert).await,
            chat: deliver(self.chat.as_deref(), alert).await,
        }
    }
}

async fn deliver(n: Option<&dyn Notifier>, alert: &Alert) -> Delivery {
    let Some(n) = n else {
        tracing::warn!("alert channel not configured, alert not sent");
        return Delivery::Disabled;
    };
    match n.send(alert).await {
        Ok(()) => {
            tracing::info!(kind = n.kind(), "alert sent");
            counter!("pipeline_alerts_sent_total", "kind" => n.kind()).increment(1);
            Delivery::Sent
        }
        Err(e) => {
            tracing::error!(kind = n.kind(), error = %format!("{e:#}"), "failed to send alert");
            Delivery::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    #[async_trait::async_trait]
    impl Notifier for Counting {
        async fn send(&self, _alert: &Alert) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn kind(&self) -> &'static str {
            "counting"
        }
    }

    struct Down;

    #[async_trait::async_trait]
    impl Notifier for Down {
        async fn send(&self, _alert: &Alert) -> Result<()> {
            Err(anyhow!("smtp down"))
        }
        fn kind(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_other() {
        let chat = Arc::new(Counting(AtomicUsize::new(0)));
        let email_n: Arc<dyn Notifier> = Arc::new(Down);
        let chat_n: Arc<dyn Notifier> = chat.clone();
        let mux = AlertMux::new(Some(email_n), Some(chat_n));
        let report = mux.dispatch(&Alert::run_failed("boom", 4)).await;
        assert_eq!(report.email, Delivery::Failed);
        assert_eq!(report.chat, Delivery::Sent);
        assert_eq!(chat.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unconfigured_channels_are_disabled() {
        let report = AlertMux::default().dispatch(&Alert::run_failed("x", 1)).await;
        assert_eq!(report.email, Delivery::Disabled);
        assert_eq!(report.chat, Delivery::Disabled);
    }

    #[test]
    fn texts_carry_detail_verbatim() {
        let a = Alert::run_failed("write data/out.csv: Permission denied (os error 13)", 4);
        assert!(a.chat_text().ends_with("write data/out.csv: Permission denied (os error 13)"));
        assert!(a.email_body().contains("Permission denied (os error 13)"));
        assert!(a.email_body().contains("4 attempt(s)"));
    }
}
