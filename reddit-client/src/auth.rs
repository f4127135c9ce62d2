use engager_core::{CoreError, RedditApiError};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, ResourceOwnerPassword,
    ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Refresh this long before Reddit says the token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now + EXPIRY_MARGIN >= self.expires_at
    }
}

/// Script-app credentials exchanged through the OAuth2 password grant.
#[derive(Debug, Clone)]
pub struct PasswordAuthenticator {
    oauth: BasicClient,
    username: ResourceOwnerUsername,
    password: ResourceOwnerPassword,
    http_client: reqwest::Client,
}

impl PasswordAuthenticator {
    pub fn new(
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
        http_client: reqwest::Client,
    ) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            RedditApiError::AuthenticationFailed {
                reason: format!("invalid authorize url: {e}"),
            }
        })?;
        let token_url = TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| {
            RedditApiError::AuthenticationFailed {
                reason: format!("invalid token url: {e}"),
            }
        })?;

        let oauth = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth,
            username: ResourceOwnerUsername::new(username),
            password: ResourceOwnerPassword::new(password),
            http_client,
        })
    }

    pub fn required_scopes() -> Vec<&'static str> {
        vec!["identity", "read", "submit"]
    }

    pub async fn request_token(&self) -> Result<RedditToken, CoreError> {
        debug!("Requesting Reddit access token for {}", self.username.as_str());

        let mut request = self.oauth.exchange_password(&self.username, &self.password);
        for scope in Self::required_scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let http_client = self.http_client.clone();
        let response = request
            .request_async(|req| send_token_request(http_client, req))
            .await
            .map_err(|e| RedditApiError::AuthenticationFailed {
                reason: e.to_string(),
            })?;

        let lifetime = response
            .expires_in()
            .unwrap_or_else(|| Duration::from_secs(3600));
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        info!(
            "Obtained Reddit access token for {} (valid {}s)",
            self.username.as_str(),
            lifetime.as_secs()
        );
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope,
        })
    }
}

/// Token endpoint transport that reuses the client carrying Reddit's required user agent.
async fn send_token_request(
    client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
