//! Storage module for persisting crawl data
//!
//! This module handles everything that touches disk during a crawl:
//! - The append-only JSONL record sink with torn-tail repair
//! - The SQLite snapshot rebuilt at session end
//! - The append-only visited-post log and its in-memory set
//! - Atomic replacement of whole documents (metadata, merged outputs)

mod jsonl;
mod schema;
mod sqlite;
mod traits;
mod visited;

pub use jsonl::{read_complete_lines, read_records, repair_torn_tail, JsonlSink};
pub use sqlite::{init_database, SqliteSnapshot};
pub use traits::{RecordSink, SnapshotSink, StorageError, StorageResult};
pub use visited::{read_visited_log, VisitedSetStore};

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Writes `contents` to `dest` via a temporary sibling and a rename
///
/// Readers see either the old file or the new one, never a partial write.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> StorageResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(dest);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, dest)?;
    Ok(())
}

/// Temporary sibling path used for atomic replacement
pub fn tmp_path(dest: &Path) -> std::path::PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

/// Final status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitStatus {
    Running,
    Completed,
    Interrupted,
    Error,
}

impl ExitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Error => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
