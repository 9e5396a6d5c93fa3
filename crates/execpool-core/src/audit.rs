//! Append-only audit log of execution attempts.
//!
//! Entries are written once and never updated or deleted. Each append runs in
//! its own transaction, so concurrent dispatchers rely on SQLite for ordering
//! and the dispatcher itself holds no lock. `id` is the storage order;
//! `log_id` is a fresh UUID minted at write time and is unrelated to the
//! execution id of the request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AuditLogError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS execution_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    log_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    code TEXT NOT NULL,
    result TEXT NOT NULL,
    response_status_code INTEGER,
    stderr TEXT
)
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub log_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub code: String,
    pub result: String,
    pub response_status_code: Option<i32>,
    pub stderr: Option<String>,
}

#[derive(Clone)]
pub struct AuditLogStore {
    pool: SqlitePool,
}

impl AuditLogStore {
    /// Opens (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, AuditLogError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        log::info!("Audit log opened at {}", database_url);
        Self::with_pool(pool).await
    }

    /// A private in-memory store. Pinned to one connection that never expires,
    /// since every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, AuditLogError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, AuditLogError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn append(
        &self,
        code: &str,
        result: &str,
        response_status_code: Option<i32>,
        stderr: Option<&str>,
    ) -> Result<AuditLogEntry, AuditLogError> {
        let log_id = Uuid::new_v4();
        let timestamp = Utc::now();

        let mut tx = self.pool.begin().await?;
        let done = sqlx::query(
            "INSERT INTO execution_log (log_id, timestamp, code, result, response_status_code, stderr) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(log_id.to_string())
        .bind(timestamp.to_rfc3339())
        .bind(code)
        .bind(result)
        .bind(response_status_code)
        .bind(stderr)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(AuditLogEntry {
            id: done.last_insert_rowid(),
            log_id,
            timestamp,
            code: code.to_string(),
            result: result.to_string(),
            response_status_code,
            stderr: stderr.map(str::to_string),
        })
    }

    /// All entries in storage order.
    pub async fn list_all(&self) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        let rows = sqlx::query(
            "SELECT id, log_id, timestamp, code, result, response_status_code, stderr \
             FROM execution_log ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<AuditLogEntry, AuditLogError> {
    let id: i64 = row.try_get("id")?;
    let log_id: String = row.try_get("log_id")?;
    let timestamp: String = row.try_get("timestamp")?;

    let log_id = Uuid::parse_str(&log_id).map_err(|e| AuditLogError::CorruptRow {
        id,
        message: format!("bad log_id: {}", e),
    })?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AuditLogError::CorruptRow {
            id,
            message: format!("bad timestamp: {}", e),
        })?;

    Ok(AuditLogEntry {
        id,
        log_id,
        timestamp,
        code: row.try_get("code")?,
        result: row.try_get("result")?,
        response_status_code: row.try_get("response_status_code")?,
        stderr: row.try_get("stderr")?,
    })
}
