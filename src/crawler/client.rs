//! HTTP implementation of [`RedditApi`]
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent
//! - Paginated listing requests
//! - Comment tree, "load more" and "continue this thread" requests
//! - Optional app-only OAuth (client credentials) with in-memory token refresh; a
//!   rejected token is dropped and reported as transient so the retry fetches a new one
//! - Mapping HTTP and transport failures to [`ApiError`]

use crate::config::{ApiConfig, Strategy};
use crate::crawler::api::{ApiError, CommentNode, MoreComments, Post, RedditApi};
use crate::crawler::parser::{
    parse_comment_page, parse_listing, parse_more_children, parse_thread_continuation,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Reddit caps listing pages at 100 items
pub const PAGE_SIZE: u32 = 100;

/// Maximum ids per `/api/morechildren` call
pub const MORE_CHILDREN_BATCH: usize = 100;

/// Tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// App credentials for the client-credentials grant
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Reads credentials from the env variables named in the config
    ///
    /// Returns None unless both variables are set and non-empty.
    pub fn from_env(config: &ApiConfig) -> Option<Self> {
        let client_id = std::env::var(&config.client_id_env).ok()?;
        let client_secret = std::env::var(&config.client_secret_env).ok()?;
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return None;
        }
        Some(Self {
            client_id,
            client_secret,
        })
    }
}

/// Resolves the user agent: env override first, then the configured value
pub fn resolve_user_agent(config: &ApiConfig) -> String {
    std::env::var(&config.user_agent_env)
        .ok()
        .filter(|ua| !ua.trim().is_empty())
        .unwrap_or_else(|| config.user_agent.clone())
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header sent with every request
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

struct OAuth {
    credentials: Credentials,
    auth_url: String,
    token: Mutex<Option<AccessToken>>,
}

/// Reddit JSON API client
pub struct RedditClient {
    http: Client,
    base_url: String,
    oauth: Option<OAuth>,
}

impl RedditClient {
    /// Creates a client; with credentials every request carries an app-only token
    pub fn new(config: &ApiConfig, credentials: Option<Credentials>) -> Result<Self, reqwest::Error> {
        let user_agent = resolve_user_agent(config);
        let http = build_http_client(&user_agent, Duration::from_secs(config.request_timeout_secs))?;

        let (base_url, oauth) = match credentials {
            Some(credentials) => (
                config.oauth_base_url.clone(),
                Some(OAuth {
                    credentials,
                    auth_url: config.auth_url.clone(),
                    token: Mutex::new(None),
                }),
            ),
            None => (config.base_url.clone(), None),
        };

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            oauth,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.oauth.is_some()
    }

    /// Returns a valid bearer token, fetching a new one when missing or near expiry
    async fn bearer(&self) -> Result<Option<String>, ApiError> {
        let Some(oauth) = &self.oauth else {
            return Ok(None);
        };

        let mut guard = oauth.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(Some(token.value.clone()));
            }
        }

        tracing::debug!("Requesting app-only access token");
        let response = self
            .http
            .post(&oauth.auth_url)
            .basic_auth(
                &oauth.credentials.client_id,
                Some(&oauth.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16()));
        }

        let body: TokenResponse = response.json().await?;
        let token = AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        };
        *guard = Some(token.clone());
        Ok(Some(token.value))
    }

    async fn invalidate_token(&self) {
        if let Some(oauth) = &self.oauth {
            *oauth.token.lock().await = None;
        }
    }

    /// GETs `path` (relative to the base URL) and decodes the JSON body
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).query(&[("raw_json", "1")]).query(query);
        if let Some(token) = self.bearer().await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 401 && self.oauth.is_some() {
                tracing::debug!("Access token rejected for {}, dropping it", path);
                self.invalidate_token().await;
                return Err(ApiError::TokenRejected);
            }
            return Err(ApiError::from_status(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl RedditApi for RedditClient {
    async fn list_posts(
        &self,
        subreddit: &str,
        strategy: &Strategy,
        limit: Option<u32>,
    ) -> Result<Vec<Post>, ApiError> {
        let path = format!("/r/{}/{}.json", subreddit, strategy.listing.as_str());
        let mut posts: Vec<Post> = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let remaining = limit.map(|l| l.saturating_sub(posts.len() as u32));
            if remaining == Some(0) {
                break;
            }
            let page_size = remaining.map_or(PAGE_SIZE, |r| r.min(PAGE_SIZE));

            let mut query = vec![("limit", page_size.to_string())];
            if let Some(window) = strategy.window {
                query.push(("t", window.as_str().to_string()));
            }
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let page = parse_listing(&self.get_json(&path, &query).await?)?;
            let fetched = page.posts.len();
            posts.extend(page.posts);
            tracing::debug!(
                "Listed {} posts from r/{} ({} so far)",
                fetched,
                subreddit,
                posts.len()
            );

            match page.after {
                Some(cursor) if fetched > 0 => after = Some(cursor),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            posts.truncate(limit as usize);
        }
        Ok(posts)
    }

    async fn fetch_comment_tree(&self, post: &Post) -> Result<Vec<CommentNode>, ApiError> {
        let path = format!("/comments/{}.json", post.id);
        let value = self.get_json(&path, &[]).await?;
        parse_comment_page(&value)
    }

    async fn fetch_more(
        &self,
        post: &Post,
        more: &MoreComments,
    ) -> Result<Vec<CommentNode>, ApiError> {
        if more.is_continue_thread() {
            let Some(parent) = more.parent_comment_id() else {
                return Ok(Vec::new());
            };
            let path = format!("/comments/{}/_/{}.json", post.id, parent);
            let value = self.get_json(&path, &[]).await?;
            return parse_thread_continuation(&value, parent);
        }

        let mut nodes = Vec::new();
        for chunk in more.children.chunks(MORE_CHILDREN_BATCH) {
            let query = [
                ("api_type", "json".to_string()),
                ("link_id", format!("t3_{}", post.id)),
                ("children", chunk.join(",")),
            ];
            let value = self.get_json("/api/morechildren.json", &query).await?;
            nodes.extend(parse_more_children(&value)?);
        }
        Ok(nodes)
    }
}
