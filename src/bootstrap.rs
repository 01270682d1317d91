// src/bootstrap.rs
//! Wires concrete collaborators from a [`PipelineConfig`].

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::ingest::slack::SlackHistorySource;
use crate::notify::email::EmailNotifier;
use crate::notify::slack::SlackAlertNotifier;
use crate::notify::{AlertMux, Notifier};
use crate::orchestrator::Orchestrator;
use crate::pipeline::ClusteringPipeline;
use crate::sink::csv_file::CsvFileSink;
use crate::sink::sql::SqlTableSink;
use crate::sink::DatabaseSink;

pub fn build_pipeline(cfg: &PipelineConfig) -> ClusteringPipeline {
    let source = Arc::new(SlackHistorySource::new(cfg.source_auth_token.clone()));
    let file = Arc::new(CsvFileSink::new(cfg.output_path.clone()));

    let db: Option<Arc<dyn DatabaseSink>> = match cfg.database_url.as_deref() {
        None => {
            info!("DATABASE_URL not provided, database persistence disabled");
            None
        }
        Some(url) => match SqlTableSink::from_url(url, &cfg.table_name) {
            Ok(sink) => {
                info!(backend = sink.backend().as_str(), table = %cfg.table_name, "database persistence enabled");
                Some(Arc::new(sink))
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "database sink unusable, persistence disabled");
                None
            }
        },
    };

    ClusteringPipeline::new(source, cfg.channels.clone(), cfg.kmeans(), file)
        .with_page_limit(cfg.page_limit)
        .with_database(db)
}

pub fn build_alerts(cfg: &PipelineConfig) -> AlertMux {
    let email: Option<Arc<dyn Notifier>> = match &cfg.smtp {
        None => {
            warn!("SMTP settings incomplete, email alerts disabled");
            None
        }
        Some(smtp) => match EmailNotifier::from_config(smtp) {
            Ok(n) => Some(Arc::new(n)),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "email alerts disabled");
                None
            }
        },
    };

    let chat: Option<Arc<dyn Notifier>> = match &cfg.alert_channel_id {
        None => {
            warn!("SLACK_ALERT_CHANNEL not set, chat alerts disabled");
            None
        }
        Some(channel) => Some(Arc::new(SlackAlertNotifier::new(
            cfg.source_auth_token.clone(),
            channel.clone(),
        ))),
    };

    AlertMux::new(email, chat)
}

pub fn build_orchestrator(cfg: &PipelineConfig) -> Orchestrator {
    Orchestrator::new(
        Arc::new(build_pipeline(cfg)),
        cfg.retry_policy(),
        build_alerts(cfg),
    )
}
