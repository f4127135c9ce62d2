use engager_core::{
    ConfigError, CoreError, DatabaseError, DiscoveryError, ErrorExt, ErrorReporter, LlmError,
    RedditApiError, ResponseStatus,
};

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let db_error = CoreError::Database(DatabaseError::TransactionFailed {
        reason: "busy".to_string(),
    });
    assert_eq!(db_error.error_code(), "DATABASE");

    let llm_error = CoreError::Llm(LlmError::EmptyCompletion {
        provider: "lm-studio".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM");

    let discovery_error = CoreError::Discovery(DiscoveryError::NoJson {
        raw: "no threads today".to_string(),
    });
    assert_eq!(discovery_error.error_code(), "DISCOVERY");

    let state_error = CoreError::InvalidState {
        response_id: 7,
        status: ResponseStatus::Failed,
    };
    assert_eq!(state_error.error_code(), "INVALID_STATE");
}

#[test]
fn test_only_storage_errors_escalate() {
    let storage = CoreError::Database(DatabaseError::ConnectionFailed {
        reason: "gone".to_string(),
    });
    assert!(storage.is_storage());

    let posting = CoreError::RedditApi(RedditApiError::CommentRejected {
        reason: "THREAD_LOCKED".to_string(),
    });
    assert!(!posting.is_storage());

    let state = CoreError::InvalidState {
        response_id: 1,
        status: ResponseStatus::Posted,
    };
    assert!(!state.is_storage());
}

#[test]
fn test_discovery_parse_failures_keep_raw_output() {
    let no_json = CoreError::Discovery(DiscoveryError::NoJson {
        raw: "Nothing relevant today.".to_string(),
    });
    assert_eq!(no_json.discovery_output(), Some("Nothing relevant today."));
    assert!(!no_json.to_string().contains("Nothing relevant"));

    let malformed = CoreError::Discovery(DiscoveryError::MalformedJson {
        details: "EOF".to_string(),
        raw: "{\"threads\": [".to_string(),
    });
    assert_eq!(malformed.discovery_output(), Some("{\"threads\": ["));

    let timeout = CoreError::Discovery(DiscoveryError::CliTimeout { seconds: 120 });
    assert_eq!(timeout.discovery_output(), None);
}

#[test]
fn test_sqlx_errors_are_storage_errors() {
    let error: CoreError = sqlx::Error::RowNotFound.into();
    assert!(error.is_storage());
    assert_eq!(error.error_code(), "DATABASE");
}

#[test]
fn test_invalid_state_message_names_status() {
    let error = CoreError::InvalidState {
        response_id: 42,
        status: ResponseStatus::Failed,
    };
    assert_eq!(
        error.to_string(),
        "Response 42 is already failed, cannot transition again"
    );
    assert!(error.user_friendly_message().contains("already failed"));
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "REDDIT_PASSWORD".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("REDDIT_PASSWORD"));

    let discovery_error = CoreError::Discovery(DiscoveryError::CliNotFound {
        cli_path: "gemini".to_string(),
    });
    assert!(discovery_error.user_friendly_message().contains("gemini"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new();
    let error = CoreError::RedditApi(RedditApiError::InvalidToken);

    // This test just ensures reporting doesn't panic
    reporter.report_error(&error);
}
