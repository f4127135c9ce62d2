use chrono::{DateTime, Utc};
use engager_core::{CoreError, DatabaseError, ResponseRecord, ResponseStatus};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{info, warn};

use crate::to_datetime;

const RESPONSE_COLUMNS: &str = "id, thread_id, response_text, status, generated_at, posted_at, \
                                comment_id, error_message";

/// Durable record of every drafted reply.
///
/// A response is born `pending` and moves exactly once, to `posted` or `failed`.
/// Both transitions are guarded updates so a second transition is rejected with
/// [`CoreError::InvalidState`] and leaves the row untouched.
#[derive(Debug, Clone)]
pub struct ResponseLedger {
    pool: SqlitePool,
}

impl ResponseLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_pending(
        &self,
        thread_id: i64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        let result = sqlx::query(
            "INSERT INTO responses (thread_id, response_text, status, generated_at)
             VALUES (?, ?, 'pending', ?)",
        )
        .bind(thread_id)
        .bind(text)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        let response_id = result.last_insert_rowid();
        info!(
            "Added response {} for thread {} (status: pending)",
            response_id, thread_id
        );
        Ok(response_id)
    }

    pub async fn mark_posted(
        &self,
        response_id: i64,
        comment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE responses SET status = 'posted', posted_at = ?, comment_id = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(now.timestamp())
        .bind(comment_id)
        .bind(response_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let error = transition_error(&mut tx, response_id).await;
            tx.rollback().await?;
            return Err(error);
        }
        tx.commit().await?;

        info!(
            "Response {} marked as posted (comment: {})",
            response_id, comment_id
        );
        Ok(())
    }

    pub async fn mark_failed(&self, response_id: i64, error_message: &str) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE responses SET status = 'failed', error_message = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(error_message)
        .bind(response_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let error = transition_error(&mut tx, response_id).await;
            tx.rollback().await?;
            return Err(error);
        }
        tx.commit().await?;

        warn!(
            "Response {} marked as failed: {}",
            response_id, error_message
        );
        Ok(())
    }

    /// True when the thread already has a reply in flight or on Reddit.
    pub async fn has_pending_or_posted(&self, thread_id: i64) -> Result<bool, CoreError> {
        let engaged: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM responses
                 WHERE thread_id = ? AND status IN ('pending', 'posted')
             )",
        )
        .bind(thread_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(engaged != 0)
    }

    /// When the most recent failed attempt for the thread was drafted.
    pub async fn last_failed_at(&self, thread_id: i64) -> Result<Option<DateTime<Utc>>, CoreError> {
        let latest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(generated_at) FROM responses WHERE thread_id = ? AND status = 'failed'",
        )
        .bind(thread_id)
        .fetch_one(&self.pool)
        .await?;
        latest.map(|secs| to_datetime("responses", secs)).transpose()
    }

    pub async fn get_response(&self, response_id: i64) -> Result<Option<ResponseRecord>, CoreError> {
        let sql = format!("SELECT {RESPONSE_COLUMNS} FROM responses WHERE id = ?");
        sqlx::query(&sql)
            .bind(response_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| response_from_row(&row))
            .transpose()
    }

    pub async fn responses_for_thread(&self, thread_id: i64) -> Result<Vec<ResponseRecord>, CoreError> {
        let sql = format!("SELECT {RESPONSE_COLUMNS} FROM responses WHERE thread_id = ? ORDER BY id");
        sqlx::query(&sql)
            .bind(thread_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(response_from_row)
            .collect()
    }
}

/// Explain why a guarded transition touched no row.
async fn transition_error(tx: &mut sqlx::SqliteConnection, response_id: i64) -> CoreError {
    let status: Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT status FROM responses WHERE id = ?")
            .bind(response_id)
            .fetch_optional(&mut *tx)
            .await;

    match status {
        Ok(Some(raw)) => match raw.parse::<ResponseStatus>() {
            Ok(status) => CoreError::InvalidState {
                response_id,
                status,
            },
            Err(details) => DatabaseError::CorruptRow {
                table: "responses".to_string(),
                details,
            }
            .into(),
        },
        Ok(None) => CoreError::NotFound {
            resource: format!("response {response_id}"),
        },
        Err(e) => e.into(),
    }
}

fn response_from_row(row: &SqliteRow) -> Result<ResponseRecord, CoreError> {
    let raw_status: String = row.try_get("status")?;
    let status = raw_status
        .parse::<ResponseStatus>()
        .map_err(|details| DatabaseError::CorruptRow {
            table: "responses".to_string(),
            details,
        })?;
    let posted_at: Option<i64> = row.try_get("posted_at")?;

    Ok(ResponseRecord {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        response_text: row.try_get("response_text")?,
        status,
        generated_at: to_datetime("responses", row.try_get("generated_at")?)?,
        posted_at: posted_at
            .map(|secs| to_datetime("responses", secs))
            .transpose()?,
        comment_id: row.try_get("comment_id")?,
        error_message: row.try_get("error_message")?,
    })
}
