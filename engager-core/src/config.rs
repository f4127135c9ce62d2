use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::ConfigError;

/// Longest cooldown accepted from configuration, roughly 27 000 years.
const MAX_COOLDOWN_DAYS: i64 = 10_000_000;
const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub reddit: RedditConfig,
    pub database: DatabaseConfig,
    pub discovery: DiscoveryConfig,
    pub generation: GenerationConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./database/reddit_engagement.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub cli_path: String,
    pub prompt_file: PathBuf,
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cli_path: "gemini".to_string(),
            prompt_file: PathBuf::from("./prompts/gemini_discovery.txt"),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    /// `-1` lets the server decide.
    pub max_tokens: i32,
    pub prompt_file: PathBuf,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:1234/v1/chat/completions".to_string(),
            model: "meta-llama-3.1-8b-instruct".to_string(),
            temperature: 0.7,
            max_tokens: -1,
            prompt_file: PathBuf::from("./prompts/response_generation.txt"),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub check_interval_minutes: u64,
    pub subreddit_cooldown_days: i64,
    pub thread_cooldown_days: i64,
    pub max_posts_per_cycle: Option<usize>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: 10,
            subreddit_cooldown_days: 3,
            thread_cooldown_days: 999_999,
            max_posts_per_cycle: None,
        }
    }
}

impl ScheduleConfig {
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_minutes.saturating_mul(60))
    }

    pub fn subreddit_cooldown(&self) -> Duration {
        Duration::days(self.subreddit_cooldown_days.clamp(0, MAX_COOLDOWN_DAYS))
    }

    pub fn thread_cooldown(&self) -> Duration {
        Duration::days(self.thread_cooldown_days.clamp(0, MAX_COOLDOWN_DAYS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("./logs/reddit_bot.log")),
        }
    }
}

impl BotConfig {
    /// Load the optional TOML file, overlay the process environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay values using the environment variable names the bot has always used.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };
        text("REDDIT_CLIENT_ID", &mut self.reddit.client_id);
        text("REDDIT_CLIENT_SECRET", &mut self.reddit.client_secret);
        text("REDDIT_USERNAME", &mut self.reddit.username);
        text("REDDIT_PASSWORD", &mut self.reddit.password);
        text("REDDIT_USER_AGENT", &mut self.reddit.user_agent);
        text("GEMINI_CLI_PATH", &mut self.discovery.cli_path);
        text("LM_STUDIO_URL", &mut self.generation.api_url);
        text("LM_STUDIO_MODEL", &mut self.generation.model);
        text("LOG_LEVEL", &mut self.logging.level);

        if let Some(path) = lookup("DATABASE_PATH").filter(|v| !v.is_empty()) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("LOG_FILE") {
            self.logging.file = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Some(v) = parsed(&lookup, "LM_STUDIO_TEMPERATURE")? {
            self.generation.temperature = v;
        }
        if let Some(v) = parsed(&lookup, "LM_STUDIO_MAX_TOKENS")? {
            self.generation.max_tokens = v;
        }
        if let Some(v) = parsed(&lookup, "CHECK_INTERVAL_MINUTES")? {
            self.schedule.check_interval_minutes = v;
        }
        if let Some(v) = parsed(&lookup, "SUBREDDIT_COOLDOWN_DAYS")? {
            self.schedule.subreddit_cooldown_days = v;
        }
        if let Some(v) = parsed(&lookup, "THREAD_COOLDOWN_DAYS")? {
            self.schedule.thread_cooldown_days = v;
        }
        if let Some(v) = parsed(&lookup, "MAX_POSTS_PER_CYCLE")? {
            self.schedule.max_posts_per_cycle = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("REDDIT_CLIENT_ID", &self.reddit.client_id),
            ("REDDIT_CLIENT_SECRET", &self.reddit.client_secret),
            ("REDDIT_USERNAME", &self.reddit.username),
            ("REDDIT_PASSWORD", &self.reddit.password),
            ("REDDIT_USER_AGENT", &self.reddit.user_agent),
        ];
        if let Some((var_name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::MissingEnvironmentVariable {
                var_name: var_name.to_string(),
            });
        }

        if !(1..=MAX_CHECK_INTERVAL_MINUTES).contains(&self.schedule.check_interval_minutes) {
            return Err(ConfigError::InvalidValue {
                field: "schedule.check_interval_minutes".to_string(),
                value: self.schedule.check_interval_minutes.to_string(),
            });
        }
        for (field, days) in [
            ("schedule.subreddit_cooldown_days", self.schedule.subreddit_cooldown_days),
            ("schedule.thread_cooldown_days", self.schedule.thread_cooldown_days),
        ] {
            if !(0..=MAX_COOLDOWN_DAYS).contains(&days) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: days.to_string(),
                });
            }
        }
        if self.schedule.max_posts_per_cycle == Some(0) {
            return Err(ConfigError::ValidationFailed {
                reason: "max_posts_per_cycle must be at least 1 when set".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "generation.temperature".to_string(),
                value: self.generation.temperature.to_string(),
            });
        }
        if self.discovery.cli_path.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "discovery.cli_path".to_string(),
            });
        }
        Ok(())
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}
