//! Remote API seam
//!
//! Sessions talk to Reddit only through the [`RedditApi`] trait so the engine can be
//! driven by the HTTP client in production and by in-memory fakes in tests.

use crate::config::Strategy;
use async_trait::async_trait;
use thiserror::Error;

/// A listed post
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub subreddit: String,
    pub title: String,
    pub selftext: String,
    /// `None` for deleted accounts
    pub author: Option<String>,
    pub score: i64,
    pub created_utc: f64,
    pub num_comments: i64,
    pub over_18: bool,
    /// Path relative to the site root, e.g. `/r/greece/comments/abc/...`
    pub permalink: String,
}

/// A single comment without its replies
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    /// Fullname of the parent (`t3_` post or `t1_` comment)
    pub parent_id: String,
    pub author: Option<String>,
    pub body: String,
    pub score: i64,
    pub created_utc: f64,
    pub depth: u32,
}

/// A collapsed part of a comment tree that needs another request
#[derive(Debug, Clone, PartialEq)]
pub struct MoreComments {
    pub id: String,
    pub parent_id: String,
    /// Ids of hidden children; empty for "continue this thread" stubs
    pub children: Vec<String>,
    pub depth: u32,
}

impl MoreComments {
    /// True for "continue this thread" stubs, which carry no child ids
    pub fn is_continue_thread(&self) -> bool {
        self.children.is_empty()
    }

    /// Comment id of the parent, without the `t1_` prefix
    pub fn parent_comment_id(&self) -> Option<&str> {
        self.parent_id.strip_prefix("t1_")
    }
}

/// Node of a (possibly partially expanded) comment tree
#[derive(Debug, Clone, PartialEq)]
pub enum CommentNode {
    Comment {
        comment: Comment,
        replies: Vec<CommentNode>,
    },
    More(MoreComments),
}

impl CommentNode {
    pub fn leaf(comment: Comment) -> Self {
        Self::Comment {
            comment,
            replies: Vec::new(),
        }
    }
}

/// Whether a failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

/// Failures reported by the remote API
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited by remote")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    /// The app-only token was refused; a retry fetches a new one
    #[error("access token rejected")]
    TokenRejected,

    #[error("content deleted")]
    Deleted,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("unexpected HTTP status {status}")]
    Http { status: u16 },
}

impl ApiError {
    /// Maps a non-success HTTP status to an error
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Forbidden,
            404 => Self::NotFound,
            408 => Self::Timeout,
            410 => Self::Deleted,
            429 => Self::RateLimited,
            500..=599 => Self::Server { status },
            _ => Self::Http { status },
        }
    }

    /// Transient failures are retried; permanent ones surface immediately
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout
            | Self::RateLimited
            | Self::Network(_)
            | Self::Server { .. }
            | Self::TokenRejected => ErrorClass::Transient,
            Self::NotFound | Self::Forbidden | Self::Deleted | Self::Malformed(_) | Self::Http { .. } => {
                ErrorClass::Permanent
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::from_status(status.as_u16())
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Read-only view of the remote listing/comment API
#[async_trait]
pub trait RedditApi: Send + Sync {
    /// Lists posts for a strategy, in listing order
    ///
    /// # Arguments
    ///
    /// * `subreddit` - Source name without the `r/` prefix
    /// * `strategy` - Listing type plus optional time window
    /// * `limit` - Maximum number of posts to return (`None` = as many as the listing has)
    async fn list_posts(
        &self,
        subreddit: &str,
        strategy: &Strategy,
        limit: Option<u32>,
    ) -> Result<Vec<Post>, ApiError>;

    /// Fetches a post's comment tree as returned, "more" stubs included
    async fn fetch_comment_tree(&self, post: &Post) -> Result<Vec<CommentNode>, ApiError>;

    /// Resolves one "more" stub into the nodes it hides
    async fn fetch_more(
        &self,
        post: &Post,
        more: &MoreComments,
    ) -> Result<Vec<CommentNode>, ApiError>;
}
