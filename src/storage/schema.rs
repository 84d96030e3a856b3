//! Snapshot schema definitions
//!
//! This module contains the SQL schema for the per-run `comments.sqlite` snapshot.

/// SQL schema for the snapshot database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS comments (
    subreddit TEXT NOT NULL,
    post_id TEXT NOT NULL,
    permalink TEXT NOT NULL,
    title TEXT NOT NULL,
    selftext TEXT NOT NULL,
    author_post TEXT NOT NULL,
    score_post INTEGER NOT NULL,
    created_utc_post REAL NOT NULL,
    num_comments_post INTEGER NOT NULL,
    over_18 INTEGER NOT NULL,
    comment_id TEXT NOT NULL,
    parent_id TEXT NOT NULL,
    comment_author TEXT NOT NULL,
    comment_body TEXT NOT NULL,
    comment_score INTEGER NOT NULL,
    created_utc_comment REAL NOT NULL,
    depth INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
CREATE INDEX IF NOT EXISTS idx_comments_id ON comments(comment_id);
"#;

/// Initializes the snapshot schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
