use crate::crawler::{Comment, Post};
use serde::{Deserialize, Serialize};

/// Base URL prepended to relative post permalinks
pub const PERMALINK_BASE: &str = "https://www.reddit.com";

/// Author placeholder for deleted accounts
pub const DELETED_AUTHOR: &str = "[deleted]";

/// One qualifying comment joined with its post
///
/// Field order is the on-disk column order of both sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub subreddit: String,
    pub post_id: String,
    pub permalink: String,
    pub title: String,
    pub selftext: String,
    pub author_post: String,
    pub score_post: i64,
    pub created_utc_post: f64,
    pub num_comments_post: i64,
    pub over_18: bool,
    pub comment_id: String,
    pub parent_id: String,
    pub comment_author: String,
    pub comment_body: String,
    pub comment_score: i64,
    pub created_utc_comment: f64,
    pub depth: u32,
}

impl CommentRecord {
    pub fn new(post: &Post, comment: &Comment) -> Self {
        Self {
            subreddit: post.subreddit.clone(),
            post_id: post.id.clone(),
            permalink: absolute_permalink(&post.permalink),
            title: post.title.clone(),
            selftext: post.selftext.clone(),
            author_post: author_or_deleted(post.author.as_deref()),
            score_post: post.score,
            created_utc_post: post.created_utc,
            num_comments_post: post.num_comments,
            over_18: post.over_18,
            comment_id: comment.id.clone(),
            parent_id: comment.parent_id.clone(),
            comment_author: author_or_deleted(comment.author.as_deref()),
            comment_body: comment.body.clone(),
            comment_score: comment.score,
            created_utc_comment: comment.created_utc,
            depth: comment.depth,
        }
    }
}

fn absolute_permalink(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{}{}", PERMALINK_BASE, permalink)
    }
}

fn author_or_deleted(author: Option<&str>) -> String {
    match author {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DELETED_AUTHOR.to_string(),
    }
}
