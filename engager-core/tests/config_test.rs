use engager_core::{BotConfig, ConfigError};
use std::collections::HashMap;
use std::path::PathBuf;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn credentials() -> Vec<(&'static str, &'static str)> {
    vec![
        ("REDDIT_CLIENT_ID", "id"),
        ("REDDIT_CLIENT_SECRET", "secret"),
        ("REDDIT_USERNAME", "leasewatch_helper"),
        ("REDDIT_PASSWORD", "hunter2"),
        ("REDDIT_USER_AGENT", "reddit-engager/0.1 by leasewatch_helper"),
    ]
}

#[test]
fn test_defaults_match_historical_values() {
    let config = BotConfig::default();
    assert_eq!(config.schedule.check_interval_minutes, 10);
    assert_eq!(config.schedule.subreddit_cooldown_days, 3);
    assert_eq!(config.schedule.thread_cooldown_days, 999_999);
    assert_eq!(config.schedule.max_posts_per_cycle, None);
    assert_eq!(config.discovery.cli_path, "gemini");
    assert_eq!(
        config.generation.api_url,
        "http://localhost:1234/v1/chat/completions"
    );
    assert_eq!(config.generation.max_tokens, -1);
    assert_eq!(
        config.database.path,
        PathBuf::from("./database/reddit_engagement.db")
    );
    assert_eq!(
        config.schedule.check_interval(),
        std::time::Duration::from_secs(600)
    );
    assert_eq!(config.schedule.subreddit_cooldown(), chrono::Duration::days(3));
}

#[test]
fn test_missing_credentials_are_reported_by_variable_name() {
    let mut config = BotConfig::default();
    config
        .apply_env(env(&[("REDDIT_CLIENT_ID", "id")]))
        .expect("env applies");

    match config.validate() {
        Err(ConfigError::MissingEnvironmentVariable { var_name }) => {
            assert_eq!(var_name, "REDDIT_CLIENT_SECRET")
        }
        other => panic!("unexpected validation result: {other:?}"),
    }
}

#[test]
fn test_environment_overrides_file_values() {
    let mut config = BotConfig::from_toml_str(
        r#"
        [schedule]
        check_interval_minutes = 30
        subreddit_cooldown_days = 7

        [generation]
        model = "qwen2.5-7b-instruct"
        "#,
    )
    .expect("valid toml");
    assert_eq!(config.schedule.check_interval_minutes, 30);
    assert_eq!(config.generation.model, "qwen2.5-7b-instruct");
    // untouched sections keep their defaults
    assert_eq!(config.discovery.timeout_secs, 60);

    let mut vars = credentials();
    vars.push(("SUBREDDIT_COOLDOWN_DAYS", "1"));
    vars.push(("MAX_POSTS_PER_CYCLE", "2"));
    vars.push(("DATABASE_PATH", "/tmp/engager.db"));
    vars.push(("LOG_FILE", ""));
    config.apply_env(env(&vars)).expect("env applies");
    config.validate().expect("config is valid");

    assert_eq!(config.schedule.check_interval_minutes, 30);
    assert_eq!(config.schedule.subreddit_cooldown_days, 1);
    assert_eq!(config.schedule.max_posts_per_cycle, Some(2));
    assert_eq!(config.database.path, PathBuf::from("/tmp/engager.db"));
    assert_eq!(config.logging.file, None);
}

#[test]
fn test_unparseable_numbers_are_rejected() {
    let mut config = BotConfig::default();
    let result = config.apply_env(env(&[("CHECK_INTERVAL_MINUTES", "ten")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { ref field, .. }) if field == "CHECK_INTERVAL_MINUTES"
    ));
}

#[test]
fn test_zero_interval_is_invalid() {
    let mut config = BotConfig::default();
    let mut vars = credentials();
    vars.push(("CHECK_INTERVAL_MINUTES", "0"));
    config.apply_env(env(&vars)).expect("env applies");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { .. })
    ));
}

#[test]
fn test_huge_interval_is_invalid() {
    let mut config = BotConfig::default();
    let mut vars = credentials();
    vars.push(("CHECK_INTERVAL_MINUTES", "18446744073709551615"));
    config.apply_env(env(&vars)).expect("env applies");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert_eq!(
        config.schedule.check_interval(),
        std::time::Duration::from_secs(u64::MAX)
    );
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let result = BotConfig::from_toml_str("[schedule\ncheck_interval_minutes = 5");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
