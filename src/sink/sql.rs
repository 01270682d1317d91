// src/sink/sql.rs
use anyhow::{anyhow, Context, Result};
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use std::time::Duration;

use super::{ClusterRecord, DatabaseSink};

pub const DEFAULT_TABLE_NAME: &str = "slack_clusters";

/// Relational backends compiled into the `sqlx` Any driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
        }
    }
}

/// Resolve `DATABASE_URL` into a URL the Any driver can open.
///
/// `postgres://` and `postgresql://` pass through. `sqlite://path`,
/// `sqlite:path` and bare filesystem paths become SQLite URLs that create the
/// file when missing. Any other scheme is rejected.
pub fn resolve_database_url(url: &str) -> Result<(Backend, String)> {
    let url = url.trim();
    if url.is_empty() {
        return Err(anyhow!("database url is empty"));
    }
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok((Backend::Postgres, url.to_string()));
    }

    let path = if let Some(rest) = url.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = url.strip_prefix("sqlite:") {
        rest
    } else if let Some((scheme, _)) = url.split_once("://") {
        return Err(anyhow!("unsupported database url scheme: {scheme}"));
    } else {
        url
    };
    if path.is_empty() || path.starts_with('?') {
        return Err(anyhow!("database url has no path"));
    }
    let resolved = if path.contains('?') {
        format!("sqlite://{path}")
    } else {
        format!("sqlite://{path}?mode=rwc")
    };
    Ok((Backend::Sqlite, resolved))
}

fn valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

/// Relational sink over any URL `sqlx` can open (SQLite or Postgres). Each
/// write drops and recreates the table, then inserts the batch, all inside
/// one transaction.
pub struct SqlTableSink {
    url: String,
    backend: Backend,
    table: String,
    connect_timeout: Duration,
}

impl SqlTableSink {
    pub fn from_url(url: &str, table: &str) -> Result<Self> {
        if !valid_table_name(table) {
            return Err(anyhow!("invalid table name: {table}"));
        }
        let (backend, url) = resolve_database_url(url)?;
        Ok(Self {
            url,
            backend,
            table: table.to_string(),
            connect_timeout: Duration::from_secs(10),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    fn create_sql(&self) -> String {
        format!(
            r#"CREATE TABLE "{}" (
                "channel"        TEXT NOT NULL,
                "user"           TEXT NOT NULL,
                "text"           TEXT NOT NULL,
                "timestamp"      TEXT NOT NULL,
                "thread_replies" BIGINT NOT NULL,
                "reaction_count" BIGINT NOT NULL,
                "word_count"     BIGINT NOT NULL,
                "cluster"        BIGINT NOT NULL
            )"#,
            self.table
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            r#"INSERT INTO "{}" ("channel", "user", "text", "timestamp", "thread_replies",
                "reaction_count", "word_count", "cluster")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
            self.table
        )
    }
}

#[async_trait::async_trait]
impl DatabaseSink for SqlTableSink {
    async fn write_table(&self, rows: &[ClusterRecord]) -> Result<()> {
        install_default_drivers();
        let table = &self.table;

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.connect_timeout)
            .connect(&self.url)
            .await
            .with_context(|| format!("connect to {} database", self.backend.as_str()))?;

        let mut tx = pool.begin().await.context("begin transaction")?;

        sqlx::query(&format!(r#"DROP TABLE IF EXISTS "{table}""#))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("drop table {table}"))?;
        sqlx::query(&self.create_sql())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("create table {table}"))?;

        let insert = self.insert_sql();
        for r in rows {
            sqlx::query(&insert)
                .bind(r.channel.as_str())
                .bind(r.user.as_str())
                .bind(r.text.as_str())
                .bind(r.timestamp.as_str())
                .bind(i64::from(r.thread_replies))
                .bind(i64::from(r.reaction_count))
                .bind(i64::from(r.word_count))
                .bind(i64::from(r.cluster))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("insert row into {table}"))?;
        }

        tx.commit().await.context("commit transaction")?;
        pool.close().await;
        tracing::debug!(backend = self.backend.as_str(), table = %table, rows = rows.len(), "table replaced");
        Ok(())
    }

    fn table_name(&self) -> &str {
        &self.table
    }
}
