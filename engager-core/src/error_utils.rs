use crate::error::*;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl CoreError {
    /// Storage failures abort the whole cycle; everything else stays with the candidate.
    pub fn is_storage(&self) -> bool {
        matches!(self, CoreError::Database(_))
    }

    /// Raw discovery output carried by a parse failure, if any.
    pub fn discovery_output(&self) -> Option<&str> {
        match self {
            CoreError::Discovery(DiscoveryError::NoJson { raw })
            | CoreError::Discovery(DiscoveryError::MalformedJson { raw, .. }) => Some(raw),
            _ => None,
        }
    }
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::Database(e) => {
                error!("Database error details: {:?}", e);
            }
            CoreError::Llm(e) => {
                error!("LLM error details: {:?}", e);
            }
            CoreError::Discovery(e) => {
                error!("Discovery error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Discovery(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidState {
                response_id,
                status,
            } => format!(
                "Response {} was already {} and cannot change again.",
                response_id, status
            ),
            CoreError::Timeout { .. } => {
                "The operation took too long to complete. It will be retried next cycle."
                    .to_string()
            }
            CoreError::NotFound { resource } => format!("Could not find: {}", resource),
            _ => "An unexpected error occurred. The next cycle will start fresh.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API".to_string(),
            CoreError::Database(_) => "DATABASE".to_string(),
            CoreError::Llm(_) => "LLM".to_string(),
            CoreError::Discovery(_) => "DISCOVERY".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidState { .. } => "INVALID_STATE".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::NotFound { .. } => "NOT_FOUND".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit authentication failed. Please check your credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Reddit asked to wait {} seconds.",
                retry_after
            ),
            RedditApiError::Forbidden { resource } => format!(
                "Access denied to {}. The account may be banned or the subreddit private.",
                resource
            ),
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("Subreddit '{}' not found or is private.", subreddit)
            }
            RedditApiError::InvalidToken => {
                "Reddit authentication token is invalid. It will be refreshed.".to_string()
            }
            RedditApiError::RequestTimeout => "Request to Reddit timed out.".to_string(),
            RedditApiError::CommentRejected { reason } => {
                format!("Reddit rejected the comment: {}", reason)
            }
            _ => "Reddit API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND".to_string(),
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN".to_string(),
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
            RedditApiError::CommentRejected { .. } => "REDDIT_COMMENT_REJECTED".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for DatabaseError {
    fn log_error(&self) -> &Self {
        error!("DatabaseError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DatabaseError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => {
                "Database connection failed. Check the database path.".to_string()
            }
            DatabaseError::MigrationFailed { .. } => {
                "Database schema could not be created or upgraded.".to_string()
            }
            DatabaseError::CorruptRow { table, .. } => {
                format!("A row in '{}' could not be read.", table)
            }
            _ => "Database error occurred. The cycle was aborted.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            DatabaseError::TransactionFailed { .. } => "DB_TRANSACTION_FAILED".to_string(),
            DatabaseError::CorruptRow { .. } => "DB_CORRUPT_ROW".to_string(),
            DatabaseError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for LlmError {
    fn log_error(&self) -> &Self {
        error!("LlmError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("LlmError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::ServiceUnavailable { provider } => format!(
                "Cannot reach {}. Make sure it is running.",
                provider
            ),
            LlmError::RequestTimeout { provider } => format!("{} timed out.", provider),
            LlmError::DraftRejected { reason } => {
                format!("The generated reply was rejected: {}", reason)
            }
            LlmError::MissingTemplate { path } => {
                format!("Response template '{}' is missing or empty.", path)
            }
            _ => "AI service error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            LlmError::ServiceUnavailable { .. } => "LLM_SERVICE_UNAVAILABLE".to_string(),
            LlmError::RequestFailed { .. } => "LLM_REQUEST_FAILED".to_string(),
            LlmError::RequestTimeout { .. } => "LLM_TIMEOUT".to_string(),
            LlmError::InvalidResponseFormat { .. } => "LLM_INVALID_RESPONSE".to_string(),
            LlmError::EmptyCompletion { .. } => "LLM_EMPTY_COMPLETION".to_string(),
            LlmError::DraftRejected { .. } => "LLM_DRAFT_REJECTED".to_string(),
            LlmError::MissingTemplate { .. } => "LLM_MISSING_TEMPLATE".to_string(),
        }
    }
}

impl ErrorExt for DiscoveryError {
    fn log_error(&self) -> &Self {
        error!("DiscoveryError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DiscoveryError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DiscoveryError::CliNotFound { cli_path } => format!(
                "Discovery CLI '{}' was not found. Check installation and PATH.",
                cli_path
            ),
            DiscoveryError::CliTimeout { seconds } => {
                format!("Discovery took longer than {} seconds.", seconds)
            }
            DiscoveryError::EmptyPrompt => "The discovery prompt file is empty.".to_string(),
            _ => "Discovery returned no usable threads this cycle.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DiscoveryError::CliNotFound { .. } => "DISCOVERY_CLI_NOT_FOUND".to_string(),
            DiscoveryError::CliFailed { .. } => "DISCOVERY_CLI_FAILED".to_string(),
            DiscoveryError::CliTimeout { .. } => "DISCOVERY_TIMEOUT".to_string(),
            DiscoveryError::NoJson { .. } => "DISCOVERY_NO_JSON".to_string(),
            DiscoveryError::MalformedJson { .. } => "DISCOVERY_MALFORMED_JSON".to_string(),
            DiscoveryError::EmptyPrompt => "DISCOVERY_EMPTY_PROMPT".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            _ => "Configuration error occurred. Please check your settings.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
    }
}
