use chrono::{DateTime, Duration, Utc};
use engager_core::{normalize_subreddit, CoreError, SubredditCooldown};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, info};

use crate::{saturating_add, to_datetime};

/// Per-subreddit last-post and cooldown-expiry tracking.
#[derive(Debug, Clone)]
pub struct CooldownLedger {
    pool: SqlitePool,
}

impl CooldownLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn is_subreddit_cooling_down(
        &self,
        subreddit: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let cooling = match self.get_cooldown(subreddit).await? {
            Some(cooldown) => {
                let active = cooldown.is_active(now);
                if active {
                    debug!(
                        "r/{} is on cooldown until {}",
                        cooldown.subreddit, cooldown.cooldown_until
                    );
                }
                active
            }
            None => false,
        };
        Ok(cooling)
    }

    /// Upsert the subreddit's row after a successful post.
    pub async fn record_post(
        &self,
        subreddit: &str,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<(), CoreError> {
        let key = normalize_subreddit(subreddit);
        let until = saturating_add(now, cooldown);

        sqlx::query(
            "INSERT INTO subreddit_cooldowns (subreddit, last_post_at, cooldown_until)
             VALUES (?, ?, ?)
             ON CONFLICT(subreddit) DO UPDATE SET
                 last_post_at = excluded.last_post_at,
                 cooldown_until = excluded.cooldown_until",
        )
        .bind(&key)
        .bind(now.timestamp())
        .bind(until.timestamp())
        .execute(&self.pool)
        .await?;

        info!("r/{} cooldown set until {}", key, until);
        Ok(())
    }

    pub async fn get_cooldown(&self, subreddit: &str) -> Result<Option<SubredditCooldown>, CoreError> {
        let row = sqlx::query(
            "SELECT subreddit, last_post_at, cooldown_until
             FROM subreddit_cooldowns WHERE subreddit = ?",
        )
        .bind(normalize_subreddit(subreddit))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(SubredditCooldown {
                subreddit: row.try_get("subreddit")?,
                last_post_at: to_datetime("subreddit_cooldowns", row.try_get("last_post_at")?)?,
                cooldown_until: to_datetime(
                    "subreddit_cooldowns",
                    row.try_get("cooldown_until")?,
                )?,
            })),
            None => Ok(None),
        }
    }

    /// Remaining cooldown, `None` when the subreddit can be posted to now.
    pub async fn time_until_eligible(
        &self,
        subreddit: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Duration>, CoreError> {
        Ok(self
            .get_cooldown(subreddit)
            .await?
            .filter(|cooldown| cooldown.is_active(now))
            .map(|cooldown| cooldown.cooldown_until - now))
    }
}
