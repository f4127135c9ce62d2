use engager_core::{CoreError, RedditApiError, ThreadMetadata};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

impl<T> RedditListing<T> {
    pub fn into_items(self) -> Vec<T> {
        self.data.children.into_iter().map(|child| child.data).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub id: String,
    pub name: String,
}

/// Body of `POST /api/comment` with `api_type=json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentResponse {
    pub json: CommentResponseBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentResponseBody {
    #[serde(default)]
    pub errors: Vec<Vec<serde_json::Value>>,
    pub data: Option<CommentResponseData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentResponseData {
    pub things: Vec<RedditListingChild<CommentThing>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentThing {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl CommentResponse {
    /// Comment id of a successful submission; API-level errors become `CommentRejected`.
    pub fn into_comment_id(self) -> Result<String, CoreError> {
        if !self.json.errors.is_empty() {
            let reason = self
                .json
                .errors
                .iter()
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|part| part.as_str())
                        .collect::<Vec<_>>()
                        .join(": ")
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RedditApiError::CommentRejected { reason }.into());
        }

        self.json
            .data
            .and_then(|data| data.things.into_iter().next())
            .map(|thing| thing.data.id)
            .ok_or_else(|| {
                RedditApiError::InvalidResponse {
                    details: "comment response contained no comment".to_string(),
                }
                .into()
            })
    }
}

#[derive(Debug, Clone)]
pub struct RedditApiClient {
    http_client: Client,
    user_agent: String,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            user_agent,
            base_url: REDDIT_API_BASE.to_string(),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let start_time = Instant::now();

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(RedditApiError::RequestTimeout.into());
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!("Request failed with status: {} for {}", status, endpoint);
            return Err(match status.as_u16() {
                429 => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.parse::<u64>().ok())
                        .unwrap_or(60);
                    warn!("Rate limited, retry after {} seconds", retry_after);
                    RedditApiError::RateLimitExceeded { retry_after }
                }
                401 => RedditApiError::InvalidToken,
                403 => RedditApiError::Forbidden {
                    resource: endpoint.to_string(),
                },
                404 => RedditApiError::InvalidResponse {
                    details: format!("Resource not found: {endpoint}"),
                },
                code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
                code => RedditApiError::InvalidResponse {
                    details: format!("Unexpected status {code} for {endpoint}"),
                },
            }
            .into());
        }

        debug!(
            "Request successful: {} {} in {:?}",
            status,
            endpoint,
            start_time.elapsed()
        );
        Ok(response)
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<RedditUserData, CoreError> {
        let response = self
            .make_request(Method::GET, "/api/v1/me", access_token, None, None)
            .await?;

        let user_data: RedditUserData = response.json().await.map_err(|e| {
            error!("Failed to parse user data: {}", e);
            RedditApiError::InvalidResponse {
                details: "Failed to parse user data".to_string(),
            }
        })?;

        debug!("Retrieved user info for: {}", user_data.name);
        Ok(user_data)
    }

    /// Newest submissions of a subreddit.
    pub async fn get_new_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/new", subreddit);
        let limit_str = limit.to_string();
        let params = [("limit", limit_str.as_str()), ("raw_json", "1")];

        let listing = self
            .fetch_listing(&endpoint, access_token, &params, subreddit)
            .await?;
        info!("Retrieved {} new posts from r/{}", listing.len(), subreddit);
        Ok(listing)
    }

    /// Subreddit-restricted search, newest first within the last week.
    pub async fn search_subreddit(
        &self,
        access_token: &str,
        subreddit: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/search", subreddit);
        let limit_str = limit.to_string();
        let params = [
            ("q", query),
            ("restrict_sr", "1"),
            ("sort", "new"),
            ("t", "week"),
            ("limit", limit_str.as_str()),
            ("raw_json", "1"),
        ];

        let listing = self
            .fetch_listing(&endpoint, access_token, &params, subreddit)
            .await?;
        debug!("Search in r/{} returned {} posts", subreddit, listing.len());
        Ok(listing)
    }

    /// Fetch a single submission by its base-36 id.
    pub async fn get_post_by_id(
        &self,
        access_token: &str,
        reddit_thread_id: &str,
    ) -> Result<Option<RedditPostData>, CoreError> {
        let endpoint = format!("/by_id/t3_{}", reddit_thread_id);
        let params = [("raw_json", "1")];
        let mut posts = self
            .fetch_listing(&endpoint, access_token, &params, reddit_thread_id)
            .await?;
        Ok(if posts.is_empty() {
            None
        } else {
            Some(posts.swap_remove(0))
        })
    }

    pub async fn submit_comment(
        &self,
        access_token: &str,
        reddit_thread_id: &str,
        text: &str,
    ) -> Result<String, CoreError> {
        let thing_id = format!("t3_{}", reddit_thread_id);
        let form = [
            ("api_type", "json"),
            ("thing_id", thing_id.as_str()),
            ("text", text),
        ];

        let response = self
            .make_request(Method::POST, "/api/comment", access_token, None, Some(&form[..]))
            .await?;

        let body: CommentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse comment response: {}", e);
            RedditApiError::InvalidResponse {
                details: "Failed to parse comment response".to_string(),
            }
        })?;

        body.into_comment_id()
    }

    async fn fetch_listing(
        &self,
        endpoint: &str,
        access_token: &str,
        params: &[(&str, &str)],
        target: &str,
    ) -> Result<Vec<RedditPostData>, CoreError> {
        let response = self
            .make_request(Method::GET, endpoint, access_token, Some(params), None)
            .await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse listing for {}: {}", target, e);
            RedditApiError::InvalidResponse {
                details: format!("Failed to parse posts for {}", target),
            }
        })?;

        Ok(listing.into_items())
    }
}

impl From<RedditPostData> for ThreadMetadata {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            reddit_thread_id: post_data.id,
            subreddit: post_data.subreddit,
            title: post_data.title,
            url: format!("https://reddit.com{}", post_data.permalink),
            author: post_data
                .author
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "[deleted]".to_string()),
            body: if post_data.is_self {
                post_data.selftext
            } else {
                String::new()
            },
            score: post_data.score,
            num_comments: post_data.num_comments,
            created_utc: post_data.created_utc as i64,
            locked: post_data.locked,
            archived: post_data.archived,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_client_creation() {
        let client = RedditApiClient::new("test-user-agent/1.0".to_string()).unwrap();
        assert_eq!(client.user_agent(), "test-user-agent/1.0");
    }

    #[test]
    fn test_listing_parses_new_posts() {
        let raw = r#"{
            "kind": "Listing",
            "data": {
                "after": "t3_abc",
                "before": null,
                "dist": 1,
                "modhash": "",
                "children": [{
                    "kind": "t3",
                    "data": {
                        "id": "abc123",
                        "title": "Lease transfer fees?",
                        "selftext": "Is $595 normal?",
                        "author": "car_person",
                        "subreddit": "leasing",
                        "url": "https://www.reddit.com/r/leasing/comments/abc123/lease_transfer_fees/",
                        "permalink": "/r/leasing/comments/abc123/lease_transfer_fees/",
                        "created_utc": 1709290000.0,
                        "score": 12,
                        "num_comments": 4,
                        "locked": false,
                        "archived": false,
                        "is_self": true,
                        "thumbnail": "self"
                    }
                }]
            }
        }"#;
        let listing: RedditListing<RedditPostData> = serde_json::from_str(raw).unwrap();
        let posts = listing.into_items();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "abc123");
        assert!(posts[0].is_self);
    }

    #[test]
    fn test_post_conversion() {
        let post_data = RedditPostData {
            id: "test123".to_string(),
            title: "Test Post".to_string(),
            selftext: "This is test content".to_string(),
            author: None,
            subreddit: "test".to_string(),
            url: "https://i.redd.it/x.png".to_string(),
            permalink: "/r/test/comments/test123/test_post/".to_string(),
            created_utc: 1640995200.0,
            score: 42,
            num_comments: 5,
            locked: false,
            archived: true,
            is_self: true,
        };

        let metadata: ThreadMetadata = post_data.clone().into();
        assert_eq!(metadata.reddit_thread_id, "test123");
        assert_eq!(
            metadata.url,
            "https://reddit.com/r/test/comments/test123/test_post/"
        );
        assert_eq!(metadata.author, "[deleted]");
        assert_eq!(metadata.body, "This is test content");
        assert_eq!(metadata.created_utc, 1640995200);
        assert!(metadata.archived);
        assert!(!metadata.locked);

        let link_post = RedditPostData {
            is_self: false,
            ..post_data
        };
        let metadata: ThreadMetadata = link_post.into();
        assert_eq!(metadata.body, "");
    }

    #[test]
    fn test_comment_response_success() {
        let raw = r#"{"json": {"errors": [], "data": {"things": [
            {"kind": "t1", "data": {"id": "kq9x2m1", "name": "t1_kq9x2m1", "body": "hi"}}
        ]}}}"#;
        let response: CommentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.into_comment_id().unwrap(), "kq9x2m1");
    }

    #[test]
    fn test_comment_response_errors_are_rejections() {
        let raw = r#"{"json": {"errors": [
            ["THREAD_LOCKED", "that comment thread has been locked", "parent"]
        ]}}"#;
        let response: CommentResponse = serde_json::from_str(raw).unwrap();
        let err = response.into_comment_id().unwrap_err();
        match err {
            CoreError::RedditApi(RedditApiError::CommentRejected { reason }) => {
                assert!(reason.starts_with("THREAD_LOCKED"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_comment_response_without_things_is_invalid() {
        let raw = r#"{"json": {"errors": [], "data": {"things": []}}}"#;
        let response: CommentResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            response.into_comment_id(),
            Err(CoreError::RedditApi(RedditApiError::InvalidResponse { .. }))
        ));
    }
}
