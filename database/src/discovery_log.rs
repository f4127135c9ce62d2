use chrono::{DateTime, Utc};
use engager_core::{CoreError, DiscoveryQueryLog};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::debug;

use crate::to_datetime;

#[derive(Debug, Clone)]
pub struct NewDiscoveryQuery<'a> {
    pub query_text: &'a str,
    pub response_text: Option<&'a str>,
    pub success: bool,
    pub error_message: Option<&'a str>,
    pub threads_found: usize,
}

/// Append-only audit trail of discovery calls.
#[derive(Debug, Clone)]
pub struct DiscoveryLog {
    pool: SqlitePool,
}

impl DiscoveryLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        query: &NewDiscoveryQuery<'_>,
        now: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        let result = sqlx::query(
            "INSERT INTO discovery_queries
                 (query_text, response_text, executed_at, success, error_message, threads_found)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(query.query_text)
        .bind(query.response_text)
        .bind(now.timestamp())
        .bind(query.success)
        .bind(query.error_message)
        .bind(query.threads_found as i64)
        .execute(&self.pool)
        .await?;

        let query_id = result.last_insert_rowid();
        debug!(
            "Logged discovery query {} (success: {}, threads: {})",
            query_id, query.success, query.threads_found
        );
        Ok(query_id)
    }

    /// Newest entries first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<DiscoveryQueryLog>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, query_text, response_text, executed_at, success, error_message, threads_found
             FROM discovery_queries ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DiscoveryQueryLog, CoreError> {
                Ok(DiscoveryQueryLog {
                    id: row.try_get("id")?,
                    query_text: row.try_get("query_text")?,
                    response_text: row.try_get("response_text")?,
                    executed_at: to_datetime("discovery_queries", row.try_get("executed_at")?)?,
                    success: row.try_get("success")?,
                    error_message: row.try_get("error_message")?,
                    threads_found: row.try_get("threads_found")?,
                })
            })
            .collect()
    }
}
