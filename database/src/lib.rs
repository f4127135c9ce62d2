use chrono::{DateTime, Duration, Utc};
use engager_core::{CoreError, DatabaseError, EngagementStatistics};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

mod cooldowns;
mod discovery_log;
mod responses;
mod threads;


pub use cooldowns::CooldownLedger;
pub use discovery_log::{DiscoveryLog, NewDiscoveryQuery};
pub use responses::ResponseLedger;
pub use threads::ThreadRegistry;

/// Owner of the SQLite pool shared by every ledger.
#[derive(Debug, Clone)]
pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    /// Create the parent directory if needed, connect and migrate.
    pub async fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut db = Self::new(format!("sqlite://{}", path.display()));
        db.connect().await?;
        db.run_migrations().await?;
        info!("Database initialized at {}", path.display());
        Ok(db)
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: format!("invalid connection string: {e}"),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        debug!("Connected to {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool()?)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: e.to_string(),
            })?;
        debug!("Database schema created/verified");
        Ok(())
    }

    pub fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            DatabaseError::ConnectionFailed {
                reason: "database is not connected".to_string(),
            }
            .into()
        })
    }

    pub fn thread_registry(&self) -> Result<ThreadRegistry, CoreError> {
        Ok(ThreadRegistry::new(self.pool()?.clone()))
    }

    pub fn response_ledger(&self) -> Result<ResponseLedger, CoreError> {
        Ok(ResponseLedger::new(self.pool()?.clone()))
    }

    pub fn cooldown_ledger(&self) -> Result<CooldownLedger, CoreError> {
        Ok(CooldownLedger::new(self.pool()?.clone()))
    }

    pub fn discovery_log(&self) -> Result<DiscoveryLog, CoreError> {
        Ok(DiscoveryLog::new(self.pool()?.clone()))
    }

    /// Aggregate counters for the end-of-cycle summary.
    pub async fn statistics(&self, now: DateTime<Utc>) -> Result<EngagementStatistics, CoreError> {
        let pool = self.pool()?;

        let total_threads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM threads")
            .fetch_one(pool)
            .await?;

        let responses_by_status = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM responses GROUP BY status",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

        let since = now - Duration::hours(24);
        let posts_last_24h: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM responses WHERE status = 'posted' AND posted_at > ?",
        )
        .bind(since.timestamp())
        .fetch_one(pool)
        .await?;

        let active_cooldowns: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subreddit_cooldowns WHERE cooldown_until > ?")
                .bind(now.timestamp())
                .fetch_one(pool)
                .await?;

        Ok(EngagementStatistics {
            total_threads,
            responses_by_status,
            posts_last_24h,
            active_cooldowns,
        })
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

pub(crate) fn to_datetime(table: &str, secs: i64) -> Result<DateTime<Utc>, CoreError> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        DatabaseError::CorruptRow {
            table: table.to_string(),
            details: format!("timestamp {secs} out of range"),
        }
        .into()
    })
}

/// `now + duration`, saturating at the largest representable instant.
pub(crate) fn saturating_add(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    now.checked_add_signed(duration)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
