pub mod api;
pub mod auth;
pub mod matching;

#[cfg(test)]
mod tests;

pub use api::{RedditApiClient, RedditPostData, RedditUserData};
pub use auth::{PasswordAuthenticator, RedditToken};

use engager_core::{
    bare_subreddit, Candidate, CommentPoster, CoreError, RedditApiError, RedditConfig,
    ThreadLookup, ThreadMetadata,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How many of a subreddit's newest posts are scanned for a title match.
pub const NEW_POSTS_SCAN_LIMIT: u32 = 100;
/// How many search results are scanned for a title match.
pub const SEARCH_SCAN_LIMIT: u32 = 20;

/// Authenticated Reddit account used to locate threads and post replies.
#[derive(Debug, Clone)]
pub struct RedditClient {
    api: RedditApiClient,
    authenticator: PasswordAuthenticator,
    token: Arc<RwLock<Option<RedditToken>>>,
}

impl RedditClient {
    pub fn new(config: &RedditConfig) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(config.user_agent.clone())?;
        let authenticator = PasswordAuthenticator::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.username.clone(),
            config.password.clone(),
            api.http_client().clone(),
        )?;

        Ok(Self {
            api,
            authenticator,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .map(|token| !token.is_expired())
            .unwrap_or(false)
    }

    /// Cached bearer token, fetched again once it is close to expiry.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.authenticator.request_token().await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Drop the cached token when Reddit rejects it so the next call re-authenticates.
    async fn authorized<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            warn!("Reddit rejected the access token, clearing cached credentials");
            self.invalidate_token().await;
        }
        result
    }

    /// Authenticate and fetch the account profile.
    pub async fn check_connection(&self) -> Result<RedditUserData, CoreError> {
        let token = self.access_token().await?;
        let user = self.authorized(self.api.get_user_info(&token).await).await?;
        info!("Connected to Reddit as u/{}", user.name);
        Ok(user)
    }

    async fn lookup_by_url(&self, token: &str, url: &str) -> Result<Option<RedditPostData>, CoreError> {
        let Some(thread_id) = matching::thread_id_from_url(url) else {
            return Ok(None);
        };
        debug!("Looking up thread {} from candidate url", thread_id);
        self.authorized(self.api.get_post_by_id(token, &thread_id).await)
            .await
    }

    async fn lookup(&self, candidate: &Candidate) -> Result<Option<RedditPostData>, CoreError> {
        let token = self.access_token().await?;
        let subreddit = bare_subreddit(&candidate.subreddit);

        if let Some(url) = candidate.url.as_deref() {
            match self.lookup_by_url(&token, url).await {
                Ok(Some(post)) => {
                    info!("Found thread {} via candidate url", post.id);
                    return Ok(Some(post));
                }
                Ok(None) => {}
                Err(e) => warn!("Lookup by url {} failed, searching by title: {}", url, e),
            }
        }

        let new_posts = self
            .authorized(
                self.api
                    .get_new_posts(&token, subreddit, NEW_POSTS_SCAN_LIMIT)
                    .await,
            )
            .await?;
        if let Some(post) = matching::find_exact_title(&new_posts, &candidate.title) {
            info!("Found thread by exact title in r/{}", subreddit);
            return Ok(Some(post.clone()));
        }

        let quoted = format!("\"{}\"", candidate.title.trim());
        let search_results = self
            .authorized(
                self.api
                    .search_subreddit(&token, subreddit, &quoted, SEARCH_SCAN_LIMIT)
                    .await,
            )
            .await?;
        if let Some(post) = matching::find_exact_title(&search_results, &candidate.title) {
            info!("Found thread via search in r/{}", subreddit);
            return Ok(Some(post.clone()));
        }

        let mut needles = Vec::with_capacity(candidate.keywords.len() + 1);
        needles.push(candidate.title.as_str());
        needles.extend(candidate.keywords.iter().map(String::as_str));
        if let Some(post) = matching::find_by_keywords(&new_posts, &needles) {
            info!(
                "Found keyword match in r/{}: {}",
                subreddit,
                truncate(&post.title, 50)
            );
            return Ok(Some(post.clone()));
        }

        debug!("No matching thread found in r/{}", subreddit);
        Ok(None)
    }
}

impl ThreadLookup for RedditClient {
    async fn find_thread(&self, candidate: &Candidate) -> Result<Option<ThreadMetadata>, CoreError> {
        Ok(self.lookup(candidate).await?.map(ThreadMetadata::from))
    }
}

impl CommentPoster for RedditClient {
    async fn post_comment(&self, reddit_thread_id: &str, text: &str) -> Result<String, CoreError> {
        let token = self.access_token().await?;
        let comment_id = self
            .authorized(self.api.submit_comment(&token, reddit_thread_id, text).await)
            .await?;
        info!("Posted comment {} on thread {}", comment_id, reddit_thread_id);
        Ok(comment_id)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
