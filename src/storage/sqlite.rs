//! SQLite snapshot sink
//!
//! The snapshot is a typed copy of a run's records. It is never appended to; each
//! rebuild replaces the whole table inside one transaction.

use crate::output::CommentRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SnapshotSink, StorageResult};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// Opens a snapshot database and ensures its schema
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

/// Columnar snapshot backed by a SQLite file
pub struct SqliteSnapshot {
    path: PathBuf,
}

impl SqliteSnapshot {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Counts the rows currently in a snapshot file
    pub fn count_rows(path: &Path) -> StorageResult<u64> {
        let conn = init_database(path)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl SnapshotSink for SqliteSnapshot {
    fn rebuild(&mut self, records: &[CommentRecord]) -> StorageResult<usize> {
        let mut conn = init_database(&self.path)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM comments", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO comments (
                    subreddit, post_id, permalink, title, selftext, author_post, score_post,
                    created_utc_post, num_comments_post, over_18, comment_id, parent_id,
                    comment_author, comment_body, comment_score, created_utc_comment, depth
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.subreddit,
                    r.post_id,
                    r.permalink,
                    r.title,
                    r.selftext,
                    r.author_post,
                    r.score_post,
                    r.created_utc_post,
                    r.num_comments_post,
                    r.over_18,
                    r.comment_id,
                    r.parent_id,
                    r.comment_author,
                    r.comment_body,
                    r.comment_score,
                    r.created_utc_comment,
                    r.depth,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
