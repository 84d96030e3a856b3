//! Crash-safe buffering in front of the record sinks
//!
//! Records are held in memory until a flush appends them to the line-oriented sink in a
//! single write. A post only becomes eligible for the visited log once the flush holding
//! its records has returned: [`BufferedWriter::flush`] hands back exactly those post ids.

use crate::output::layout::{RECORDS_FILE, SNAPSHOT_FILE};
use crate::output::CommentRecord;
use crate::storage::{JsonlSink, RecordSink, SnapshotSink, SqliteSnapshot, StorageResult};
use std::path::{Path, PathBuf};

/// Buffers qualifying records for one session
pub struct BufferedWriter {
    records: Box<dyn RecordSink>,
    snapshot: Box<dyn SnapshotSink>,
    buffer: Vec<CommentRecord>,
    /// Completed posts whose records sit in `buffer`
    pending_posts: Vec<String>,
    threshold: usize,
    written: usize,
}

impl BufferedWriter {
    /// Opens the JSONL and SQLite sinks inside `run_dir`
    ///
    /// # Arguments
    ///
    /// * `run_dir` - Directory of the current run
    /// * `threshold` - Buffered record count that makes [`should_flush`](Self::should_flush) true
    pub fn open(run_dir: &Path, threshold: usize) -> StorageResult<Self> {
        let records = JsonlSink::open(&run_dir.join(RECORDS_FILE))?;
        let snapshot = SqliteSnapshot::new(&run_dir.join(SNAPSHOT_FILE));
        Ok(Self::with_sinks(Box::new(records), Box::new(snapshot), threshold))
    }

    pub fn with_sinks(
        records: Box<dyn RecordSink>,
        snapshot: Box<dyn SnapshotSink>,
        threshold: usize,
    ) -> Self {
        Self {
            records,
            snapshot,
            buffer: Vec::new(),
            pending_posts: Vec::new(),
            threshold: threshold.max(1),
            written: 0,
        }
    }

    pub fn add(&mut self, record: CommentRecord) {
        self.buffer.push(record);
    }

    /// Declares every record of `post_id` buffered
    ///
    /// Posts without qualifying comments are registered too, so they are released by
    /// the next flush like any other.
    pub fn complete_post(&mut self, post_id: &str) {
        self.pending_posts.push(post_id.to_string());
    }

    pub fn should_flush(&self) -> bool {
        self.buffer.len() >= self.threshold
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Records durably appended so far
    pub fn records_written(&self) -> usize {
        self.written
    }

    /// Appends the buffer to the record sink and clears it
    ///
    /// # Returns
    ///
    /// Ids of the posts completed since the previous flush, now safe to mark visited.
    /// On error nothing is released and the buffer is kept.
    pub fn flush(&mut self) -> StorageResult<Vec<String>> {
        self.write_buffer()?;
        Ok(std::mem::take(&mut self.pending_posts))
    }

    fn write_buffer(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.records.append(&self.buffer)?;
        self.written += self.buffer.len();
        tracing::debug!(
            "Flushed {} records to {}",
            self.buffer.len(),
            self.records.path().display()
        );
        self.buffer.clear();
        Ok(())
    }

    /// Rebuilds the snapshot from everything in the record sink
    ///
    /// Any still-buffered records are written first; their posts stay pending until
    /// the next [`flush`](Self::flush).
    ///
    /// # Returns
    ///
    /// Number of rows in the rebuilt snapshot.
    pub fn finalize(&mut self) -> StorageResult<usize> {
        self.write_buffer()?;
        let all = self.records.read_all()?;
        let rows = self.snapshot.rebuild(&all)?;
        tracing::info!(
            "Snapshot {} rebuilt with {} rows",
            self.snapshot.path().display(),
            rows
        );
        Ok(rows)
    }

    /// Paths of both sinks
    pub fn files(&self) -> Vec<PathBuf> {
        vec![
            self.records.path().to_path_buf(),
            self.snapshot.path().to_path_buf(),
        ]
    }
}
