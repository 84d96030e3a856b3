//! Sink traits and error types
//!
//! This module defines the interface shared by the line-oriented record sink and the
//! columnar snapshot sink, plus the storage error type.

use crate::output::CommentRecord;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt data in {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only sink for flushed records
pub trait RecordSink: Send {
    /// Appends a batch of records durably
    ///
    /// Every record is written whole or not at all; on return the batch is on disk.
    fn append(&mut self, records: &[CommentRecord]) -> StorageResult<()>;

    /// Reads back every complete record written so far
    fn read_all(&self) -> StorageResult<Vec<CommentRecord>>;

    fn path(&self) -> &Path;
}

/// Sink rebuilt wholesale from the full record set
pub trait SnapshotSink: Send {
    /// Replaces the snapshot contents with `records`, returning the row count
    fn rebuild(&mut self, records: &[CommentRecord]) -> StorageResult<usize>;

    fn path(&self) -> &Path;
}
