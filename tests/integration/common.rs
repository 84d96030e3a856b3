//! Shared fixtures: an in-memory Reddit and fast test configurations

use async_trait::async_trait;
use reddit_harvest::config::{parse_config, Config, Strategy};
use reddit_harvest::crawler::{ApiError, Comment, CommentNode, MoreComments, Post, RedditApi};
use reddit_harvest::output::layout::{RECORDS_FILE, RUNS_DIR};
use reddit_harvest::storage::read_records;
use reddit_harvest::CancellationFlag;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SUBREDDIT: &str = "greece";

/// Config with no delays, instant retries and outputs under `base_dir`
pub fn test_config(base_dir: &Path) -> Config {
    let mut config = parse_config(
        r#"
        subreddits = ["greece"]

        [crawling]
        listing = "new"
        post-limit = 0
        post-sleep-ms = 0

        [output]
        buffer-size = 1000

        [retry]
        multiplier-ms = 0
        min-delay-ms = 0
        max-delay-ms = 0
        jitter-ms = 0
        "#,
    )
    .unwrap();
    config.output.base_dir = base_dir.display().to_string();
    config
}

pub fn post(id: &str) -> Post {
    Post {
        id: id.to_string(),
        subreddit: SUBREDDIT.to_string(),
        title: format!("Post {}", id),
        selftext: String::new(),
        author: Some("op".to_string()),
        score: 10,
        created_utc: 1_700_000_000.0,
        num_comments: 3,
        over_18: false,
        permalink: format!("/r/{}/comments/{}/post/", SUBREDDIT, id),
    }
}

pub fn comment(id: &str, parent_id: &str, body: &str, depth: u32) -> Comment {
    Comment {
        id: id.to_string(),
        parent_id: parent_id.to_string(),
        author: Some("someone".to_string()),
        body: body.to_string(),
        score: 1,
        created_utc: 1_700_000_100.0,
        depth,
    }
}

/// A small tree for `post_id`: two top-level comments, one reply, one "more" stub
/// hiding a third top-level comment
pub fn standard_tree(api: &mut FakeApi, post_id: &str) {
    let parent = format!("t3_{}", post_id);
    let c1 = format!("{}_c1", post_id);
    let tree = vec![
        CommentNode::Comment {
            comment: comment(&c1, &parent, "first", 0),
            replies: vec![CommentNode::leaf(comment(
                &format!("{}_c1r", post_id),
                &format!("t1_{}", c1),
                "reply",
                1,
            ))],
        },
        CommentNode::leaf(comment(&format!("{}_c2", post_id), &parent, "second", 0)),
        CommentNode::More(MoreComments {
            id: format!("{}_more", post_id),
            parent_id: parent.clone(),
            children: vec![format!("{}_c3", post_id)],
            depth: 0,
        }),
    ];
    api.trees.insert(post_id.to_string(), tree);
    api.more.insert(
        format!("{}_more", post_id),
        vec![CommentNode::leaf(comment(
            &format!("{}_c3", post_id),
            &parent,
            "hidden",
            0,
        ))],
    );
}

/// Comment ids `standard_tree` produces for a post
pub fn standard_ids(post_id: &str) -> Vec<String> {
    ["c1", "c1r", "c2", "c3"]
        .iter()
        .map(|s| format!("{}_{}", post_id, s))
        .collect()
}

/// Scripted in-memory implementation of the remote API
#[derive(Default)]
pub struct FakeApi {
    /// Posts per combo identifier (e.g. `new`, `top:week`)
    pub listings: HashMap<String, Vec<Post>>,
    pub trees: HashMap<String, Vec<CommentNode>>,
    /// Nodes behind each "more" stub id
    pub more: HashMap<String, Vec<CommentNode>>,
    /// Listing failures per combo identifier
    pub listing_errors: HashMap<String, ApiError>,
    /// Comment tree failures per post id
    pub tree_errors: HashMap<String, ApiError>,
    /// Cancels the flag while the given post's tree is being fetched
    pub cancel_during: Option<(String, CancellationFlag)>,
    pub tree_calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn with_listing(combo: &str, ids: &[&str]) -> Self {
        let mut api = Self::default();
        api.set_listing(combo, ids);
        for id in ids {
            standard_tree(&mut api, id);
        }
        api
    }

    pub fn set_listing(&mut self, combo: &str, ids: &[&str]) {
        self.listings
            .insert(combo.to_string(), ids.iter().map(|id| post(id)).collect());
    }

    pub fn tree_calls(&self) -> Vec<String> {
        self.tree_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RedditApi for FakeApi {
    async fn list_posts(
        &self,
        _subreddit: &str,
        strategy: &Strategy,
        limit: Option<u32>,
    ) -> Result<Vec<Post>, ApiError> {
        let key = strategy.to_string();
        if let Some(error) = self.listing_errors.get(&key) {
            return Err(error.clone());
        }
        let mut posts = self.listings.get(&key).cloned().unwrap_or_default();
        if let Some(limit) = limit {
            posts.truncate(limit as usize);
        }
        Ok(posts)
    }

    async fn fetch_comment_tree(&self, post: &Post) -> Result<Vec<CommentNode>, ApiError> {
        self.tree_calls.lock().unwrap().push(post.id.clone());
        if let Some((id, flag)) = &self.cancel_during {
            if id == &post.id {
                flag.cancel();
            }
        }
        if let Some(error) = self.tree_errors.get(&post.id) {
            return Err(error.clone());
        }
        Ok(self.trees.get(&post.id).cloned().unwrap_or_default())
    }

    async fn fetch_more(
        &self,
        _post: &Post,
        more: &MoreComments,
    ) -> Result<Vec<CommentNode>, ApiError> {
        self.more.get(&more.id).cloned().ok_or(ApiError::NotFound)
    }
}

/// Comment ids in a JSONL file
pub fn comment_ids(path: &Path) -> BTreeSet<String> {
    read_records(path)
        .unwrap()
        .into_iter()
        .map(|r| r.comment_id)
        .collect()
}

pub fn records_file(run_dir: &Path) -> PathBuf {
    run_dir.join(RECORDS_FILE)
}

pub fn runs_dir(base: &Path) -> PathBuf {
    base.join(SUBREDDIT).join(RUNS_DIR)
}
