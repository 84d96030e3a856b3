//! JSON parser for Reddit listing responses
//!
//! This module turns the "thing" envelopes returned by the JSON endpoints into typed
//! values:
//! - `t3` things into [`Post`]s (listing pages)
//! - `t1` things into [`Comment`]s with their nested replies
//! - `more` things into [`MoreComments`] stubs
//!
//! Comment trees are walked with an explicit stack and assembled bottom-up, so thread
//! depth never touches the call stack.

use crate::crawler::api::{ApiError, Comment, CommentNode, MoreComments, Post};
use serde_json::Value;
use std::collections::HashMap;

/// One page of a post listing
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub posts: Vec<Post>,

    /// Cursor for the next page, if any
    pub after: Option<String>,
}

/// Parses a listing page (`/r/{sub}/{listing}.json`)
///
/// # Arguments
///
/// * `value` - The decoded response body
///
/// # Returns
///
/// * `Ok(ListingPage)` - Posts in listing order plus the `after` cursor
/// * `Err(ApiError::Malformed)` - The body is not a listing
pub fn parse_listing(value: &Value) -> Result<ListingPage, ApiError> {
    let data = value
        .get("data")
        .ok_or_else(|| ApiError::Malformed("listing without data".to_string()))?;

    let children = data
        .get("children")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Malformed("listing without children".to_string()))?;

    let mut posts = Vec::with_capacity(children.len());
    for child in children {
        if kind_of(child) == Some("t3") {
            posts.push(parse_post(&child["data"])?);
        }
    }

    let after = data
        .get("after")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(ListingPage { posts, after })
}

/// Parses a comment page (`/comments/{id}.json`) into its top-level nodes
///
/// The response is a two-element array: the post listing, then the comment listing.
pub fn parse_comment_page(value: &Value) -> Result<Vec<CommentNode>, ApiError> {
    let comments = value
        .as_array()
        .and_then(|pages| pages.get(1))
        .ok_or_else(|| ApiError::Malformed("comment page is not a two-part array".to_string()))?;

    let children = comments
        .pointer("/data/children")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Malformed("comment listing without children".to_string()))?;

    let entries = flatten_tree(children)?;
    Ok(assemble(entries))
}

/// Parses a continue-thread page and returns the replies of the focused comment
///
/// The page re-delivers the parent comment itself; only its replies are new.
pub fn parse_thread_continuation(
    value: &Value,
    parent_comment_id: &str,
) -> Result<Vec<CommentNode>, ApiError> {
    let nodes = parse_comment_page(value)?;
    for node in nodes {
        if let CommentNode::Comment { comment, replies } = node {
            if comment.id == parent_comment_id {
                return Ok(replies);
            }
        }
    }
    Ok(Vec::new())
}

/// Parses a `/api/morechildren.json` response
///
/// The endpoint returns a flat list in tree order; children are re-attached to parents
/// that appear earlier in the same response.
pub fn parse_more_children(value: &Value) -> Result<Vec<CommentNode>, ApiError> {
    if let Some(errors) = value.pointer("/json/errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            return Err(ApiError::Malformed(format!("morechildren errors: {:?}", errors)));
        }
    }

    let things = value
        .pointer("/json/data/things")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Malformed("morechildren without things".to_string()))?;

    let mut entries: Vec<FlatEntry> = Vec::with_capacity(things.len());
    let mut by_fullname: HashMap<String, usize> = HashMap::new();

    for thing in things {
        let data = &thing["data"];
        let node = match kind_of(thing) {
            Some("t1") => FlatNode::Comment(parse_comment(data, 0)?),
            Some("more") => FlatNode::More(parse_more(data, 0)),
            _ => continue,
        };

        let parent_id = match &node {
            FlatNode::Comment(c) => c.parent_id.as_str(),
            FlatNode::More(m) => m.parent_id.as_str(),
        };
        let parent = by_fullname.get(parent_id).copied();

        let idx = entries.len();
        if let FlatNode::Comment(c) = &node {
            by_fullname.insert(format!("t1_{}", c.id), idx);
        }
        entries.push(FlatEntry { parent, node });
    }

    Ok(assemble(entries))
}

enum FlatNode {
    Comment(Comment),
    More(MoreComments),
}

/// A tree node in pre-order, pointing at its parent's index
struct FlatEntry {
    parent: Option<usize>,
    node: FlatNode,
}

/// Walks nested reply listings depth-first with an explicit stack
///
/// Entries come out in pre-order, so every parent precedes its children.
fn flatten_tree(children: &[Value]) -> Result<Vec<FlatEntry>, ApiError> {
    let mut entries = Vec::new();
    let mut stack: Vec<(Option<usize>, &Value, u32)> =
        children.iter().rev().map(|thing| (None, thing, 0)).collect();

    while let Some((parent, thing, depth)) = stack.pop() {
        let data = &thing["data"];
        match kind_of(thing) {
            Some("t1") => {
                let idx = entries.len();
                entries.push(FlatEntry {
                    parent,
                    node: FlatNode::Comment(parse_comment(data, depth)?),
                });

                // `replies` is an empty string when there are none
                if let Some(replies) = data
                    .get("replies")
                    .and_then(|r| r.pointer("/data/children"))
                    .and_then(Value::as_array)
                {
                    for reply in replies.iter().rev() {
                        stack.push((Some(idx), reply, depth + 1));
                    }
                }
            }
            Some("more") => entries.push(FlatEntry {
                parent,
                node: FlatNode::More(parse_more(data, depth)),
            }),
            _ => {}
        }
    }

    Ok(entries)
}

/// Builds the nested tree from pre-order entries, children first
fn assemble(entries: Vec<FlatEntry>) -> Vec<CommentNode> {
    let mut pending: Vec<Vec<CommentNode>> = (0..entries.len()).map(|_| Vec::new()).collect();
    let mut roots = Vec::new();

    for (idx, entry) in entries.into_iter().enumerate().rev() {
        let node = match entry.node {
            FlatNode::Comment(comment) => {
                let mut replies = std::mem::take(&mut pending[idx]);
                replies.reverse();
                CommentNode::Comment { comment, replies }
            }
            FlatNode::More(more) => CommentNode::More(more),
        };

        match entry.parent {
            Some(parent) if parent < idx => pending[parent].push(node),
            _ => roots.push(node),
        }
    }

    roots.reverse();
    roots
}

fn kind_of(thing: &Value) -> Option<&str> {
    thing.get("kind").and_then(Value::as_str)
}

fn str_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn author_field(data: &Value) -> Option<String> {
    data.get("author")
        .and_then(Value::as_str)
        .filter(|a| !a.is_empty() && *a != "[deleted]")
        .map(str::to_string)
}

fn int_field(data: &Value, key: &str) -> i64 {
    data.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

fn float_field(data: &Value, key: &str) -> f64 {
    data.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn required_id(data: &Value, what: &str) -> Result<String, ApiError> {
    data.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Malformed(format!("{} without id", what)))
}

fn parse_post(data: &Value) -> Result<Post, ApiError> {
    Ok(Post {
        id: required_id(data, "post")?,
        subreddit: str_field(data, "subreddit"),
        title: str_field(data, "title"),
        selftext: str_field(data, "selftext"),
        author: author_field(data),
        score: int_field(data, "score"),
        created_utc: float_field(data, "created_utc"),
        num_comments: int_field(data, "num_comments"),
        over_18: data.get("over_18").and_then(Value::as_bool).unwrap_or(false),
        permalink: str_field(data, "permalink"),
    })
}

/// `depth` is the tree position, used when the payload carries no depth of its own
fn parse_comment(data: &Value, depth: u32) -> Result<Comment, ApiError> {
    Ok(Comment {
        id: required_id(data, "comment")?,
        parent_id: str_field(data, "parent_id"),
        author: author_field(data),
        body: str_field(data, "body"),
        score: int_field(data, "score"),
        created_utc: float_field(data, "created_utc"),
        depth: data
            .get("depth")
            .and_then(Value::as_u64)
            .map(|d| d as u32)
            .unwrap_or(depth),
    })
}

fn parse_more(data: &Value, depth: u32) -> MoreComments {
    MoreComments {
        id: str_field(data, "id"),
        parent_id: str_field(data, "parent_id"),
        children: data
            .get("children")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        depth: data
            .get("depth")
            .and_then(Value::as_u64)
            .map(|d| d as u32)
            .unwrap_or(depth),
    }
}
