use chrono::{DateTime, Utc};
use engager_core::{CoreError, ThreadMetadata, ThreadRecord};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::to_datetime;

const THREAD_COLUMNS: &str = "id, reddit_thread_id, subreddit, title, url, author, score, \
                              num_comments, created_utc, discovered_at, last_checked";

/// Durable record of every thread ever seen, keyed by the Reddit submission id.
#[derive(Debug, Clone)]
pub struct ThreadRegistry {
    pool: SqlitePool,
}

impl ThreadRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a first sighting or refresh score, comment count and `last_checked`.
    ///
    /// A single `INSERT .. ON CONFLICT` statement, so concurrent calls for the same
    /// id can never produce two rows and the internal id never changes.
    pub async fn upsert_thread(
        &self,
        thread: &ThreadMetadata,
        now: DateTime<Utc>,
    ) -> Result<ThreadRecord, CoreError> {
        let sql = format!(
            "INSERT INTO threads (reddit_thread_id, subreddit, title, url, author, score, \
                                  num_comments, created_utc, discovered_at, last_checked)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(reddit_thread_id) DO UPDATE SET
                 score = excluded.score,
                 num_comments = excluded.num_comments,
                 last_checked = excluded.last_checked
             RETURNING {THREAD_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(&thread.reddit_thread_id)
            .bind(&thread.subreddit)
            .bind(&thread.title)
            .bind(&thread.url)
            .bind(&thread.author)
            .bind(thread.score)
            .bind(thread.num_comments)
            .bind(thread.created_utc)
            .bind(now.timestamp())
            .bind(now.timestamp())
            .fetch_one(&self.pool)
            .await?;

        let record = thread_from_row(&row)?;
        if record.discovered_at == record.last_checked {
            info!(
                "Added thread {} from r/{}",
                record.reddit_thread_id, record.subreddit
            );
        } else {
            debug!(
                "Refreshed thread {} (score {}, {} comments)",
                record.reddit_thread_id, record.score, record.num_comments
            );
        }
        Ok(record)
    }

    /// True iff a posted response exists for the thread.
    pub async fn has_been_responded_to(&self, thread_id: i64) -> Result<bool, CoreError> {
        let answered: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM threads t
                 JOIN responses r ON r.thread_id = t.id
                 WHERE t.id = ? AND r.status = 'posted'
             )",
        )
        .bind(thread_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(answered != 0)
    }

    pub async fn get_thread_by_reddit_id(
        &self,
        reddit_thread_id: &str,
    ) -> Result<Option<ThreadRecord>, CoreError> {
        let sql = format!("SELECT {THREAD_COLUMNS} FROM threads WHERE reddit_thread_id = ?");
        sqlx::query(&sql)
            .bind(reddit_thread_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| thread_from_row(&row))
            .transpose()
    }

    pub async fn count(&self) -> Result<i64, CoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM threads")
            .fetch_one(&self.pool)
            .await?)
    }
}

fn thread_from_row(row: &SqliteRow) -> Result<ThreadRecord, CoreError> {
    Ok(ThreadRecord {
        id: row.try_get("id")?,
        reddit_thread_id: row.try_get("reddit_thread_id")?,
        subreddit: row.try_get("subreddit")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        author: row.try_get("author")?,
        score: row.try_get("score")?,
        num_comments: row.try_get("num_comments")?,
        created_utc: row.try_get("created_utc")?,
        discovered_at: to_datetime("threads", row.try_get("discovered_at")?)?,
        last_checked: to_datetime("threads", row.try_get("last_checked")?)?,
    })
}
