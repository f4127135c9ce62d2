#[cfg(test)]
mod tests {
    use crate::{PasswordAuthenticator, RedditClient, RedditToken};
    use engager_core::{bare_subreddit, RedditConfig};
    use std::time::{Duration, SystemTime};

    fn create_test_config() -> RedditConfig {
        RedditConfig {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            username: "test_user".to_string(),
            password: "hunter2".to_string(),
            user_agent: "reddit-engager/1.0 by test_user".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        let config = create_test_config();
        let client = RedditClient::new(&config);
        assert!(client.is_ok());

        let client = client.unwrap();
        assert_eq!(client.api().user_agent(), "reddit-engager/1.0 by test_user");
    }

    #[tokio::test]
    async fn test_new_client_is_not_authenticated() {
        let client = RedditClient::new(&create_test_config()).unwrap();
        assert!(!client.is_authenticated().await);
    }

    #[test]
    fn test_required_scopes() {
        let scopes = PasswordAuthenticator::required_scopes();
        assert_eq!(scopes, vec!["identity", "read", "submit"]);
    }

    #[test]
    fn test_token_expiry() {
        let now = SystemTime::now();

        let valid_token = RedditToken {
            access_token: "valid_token".to_string(),
            expires_at: now + Duration::from_secs(3600),
            scope: vec!["read".to_string()],
        };
        assert!(!valid_token.is_expired_at(now));

        let expired_token = RedditToken {
            expires_at: now - Duration::from_secs(1),
            ..valid_token.clone()
        };
        assert!(expired_token.is_expired_at(now));

        // Tokens inside the refresh margin are treated as expired.
        let almost_expired = RedditToken {
            expires_at: now + Duration::from_secs(30),
            ..valid_token
        };
        assert!(almost_expired.is_expired_at(now));
    }

    #[test]
    fn test_bare_subreddit() {
        assert_eq!(bare_subreddit("leasing"), "leasing");
        assert_eq!(bare_subreddit("r/leasing"), "leasing");
        assert_eq!(bare_subreddit(" /r/Leasing "), "Leasing");
    }
}
