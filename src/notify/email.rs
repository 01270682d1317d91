use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Alert, Notifier};
use crate::config::SmtpConfig;

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    pub fn from_config(cfg: &SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(cfg.user.clone(), cfg.pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("invalid SMTP_HOST {}", cfg.host))?
            .credentials(creds)
            .build();

        let from = cfg
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid NOTIFY_EMAIL_FROM {}", cfg.from))?;
        let to = cfg
            .to
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .with_context(|| format!("invalid alert recipient {addr}"))
            })
            .collect::<Result<Vec<_>>>()?;
        if to.is_empty() {
            anyhow::bail!("no alert email recipients configured");
        }

        Ok(Self { mailer, from, to })
    }
}

pub fn build_message(from: &Mailbox, to: &[Mailbox], alert: &Alert) -> Result<Message> {
    let mut builder = Message::builder().from(from.clone());
    for rcpt in to {
        builder = builder.to(rcpt.clone());
    }
    builder
        .subject(alert.subject.clone())
        .header(header::ContentType::TEXT_PLAIN)
        .body(alert.email_body())
        .context("build email")
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let msg = build_message(&self.from, &self.to, alert)?;
        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "email"
    }
}
