use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A thread surfaced by discovery, not yet verified against Reddit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub subreddit: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub relevance: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Candidate {
    pub fn new(subreddit: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            subreddit: subreddit.into(),
            title: title.into(),
            url: None,
            keywords: Vec::new(),
            relevance: None,
            reason: None,
        }
    }
}

/// Live thread state as reported by Reddit.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMetadata {
    pub reddit_thread_id: String,
    pub subreddit: String,
    pub title: String,
    pub url: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: i64,
    pub locked: bool,
    pub archived: bool,
}

impl ThreadMetadata {
    /// Context handed to the response generator.
    pub fn context_text(&self) -> String {
        let body = if self.body.trim().is_empty() {
            "[No body text]"
        } else {
            self.body.as_str()
        };
        format!(
            "Subreddit: r/{}\nThread Title: {}\nThread Content: {}",
            self.subreddit, self.title, body
        )
    }
}

/// A row of the thread registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRecord {
    pub id: i64,
    pub reddit_thread_id: String,
    pub subreddit: String,
    pub title: String,
    pub url: String,
    pub author: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: i64,
    pub discovered_at: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Pending,
    Posted,
    Failed,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Posted => "posted",
            ResponseStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseStatus::Pending)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResponseStatus::Pending),
            "posted" => Ok(ResponseStatus::Posted),
            "failed" => Ok(ResponseStatus::Failed),
            other => Err(format!("unknown response status '{other}'")),
        }
    }
}

/// One reply attempt for a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub id: i64,
    pub thread_id: i64,
    pub response_text: String,
    pub status: ResponseStatus,
    pub generated_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub comment_id: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubredditCooldown {
    pub subreddit: String,
    pub last_post_at: DateTime<Utc>,
    pub cooldown_until: DateTime<Utc>,
}

impl SubredditCooldown {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until > now
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryQueryLog {
    pub id: i64,
    pub query_text: String,
    pub response_text: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
    pub threads_found: i64,
}

/// Successful discovery call.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub candidates: Vec<Candidate>,
    pub raw_response: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngagementStatistics {
    pub total_threads: i64,
    pub responses_by_status: BTreeMap<String, i64>,
    pub posts_last_24h: i64,
    pub active_cooldowns: i64,
}

/// Subreddit name as used in API paths, without any `r/` prefix.
pub fn bare_subreddit(subreddit: &str) -> &str {
    let trimmed = subreddit.trim();
    trimmed
        .strip_prefix("/r/")
        .or_else(|| trimmed.strip_prefix("r/"))
        .unwrap_or(trimmed)
}

/// Ledger key for a subreddit. Names are case-insensitive on Reddit and
/// discovery sometimes reports them with an `r/` prefix.
pub fn normalize_subreddit(subreddit: &str) -> String {
    bare_subreddit(subreddit).to_lowercase()
}
