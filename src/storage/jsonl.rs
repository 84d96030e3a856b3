//! Line-oriented record sink
//!
//! Records are appended as one JSON object per line. A batch is serialized in full
//! before a single `write_all`, then synced, so a flush never leaves a half-written
//! record behind unless the process dies mid-syscall; that torn tail is cut off the
//! next time the file is opened.

use crate::output::CommentRecord;
use crate::storage::traits::{RecordSink, StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const TAIL_SCAN_CHUNK: u64 = 8 * 1024;

/// Truncates an unterminated trailing line left by an interrupted append
///
/// # Returns
///
/// The number of bytes removed (0 when the file is missing, empty or intact).
pub fn repair_torn_tail(path: &Path) -> StorageResult<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(0);
    }

    // Walk backwards to the last newline
    let mut keep = 0u64;
    let mut end = len;
    let mut chunk = vec![0u8; TAIL_SCAN_CHUNK as usize];
    while end > 0 {
        let start = end.saturating_sub(TAIL_SCAN_CHUNK);
        let size = (end - start) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk[..size])?;
        if let Some(pos) = chunk[..size].iter().rposition(|b| *b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    file.set_len(keep)?;
    file.sync_all()?;

    let removed = len - keep;
    tracing::warn!(
        "Truncated {} bytes of torn trailing data from {}",
        removed,
        path.display()
    );
    Ok(removed)
}

/// Reads every newline-terminated, non-empty line of a file
///
/// A trailing fragment without a newline is a torn write and is skipped.
/// A missing file reads as empty.
pub fn read_complete_lines(path: &Path) -> StorageResult<Vec<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut lines = Vec::new();
    let mut buf = String::new();
    loop {
        buf.clear();
        let n = reader.read_line(&mut buf)?;
        if n == 0 {
            break;
        }
        if !buf.ends_with('\n') {
            break;
        }
        let line = buf.trim_end_matches(['\n', '\r']);
        if !line.trim().is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Reads and decodes every complete record in a JSONL file
pub fn read_records(path: &Path) -> StorageResult<Vec<CommentRecord>> {
    read_complete_lines(path)?
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| StorageError::Corrupt {
                path: path.display().to_string(),
                reason: format!("line {}: {}", idx + 1, e),
            })
        })
        .collect()
}

/// Appends `bytes` durably, or truncates back to the previous length on failure
///
/// A short write (disk full, file size limit) would otherwise leave a record fragment
/// that the next append glues onto.
fn append_or_rollback<F>(file: &mut File, bytes: &[u8], write: F) -> StorageResult<()>
where
    F: FnOnce(&mut File, &[u8]) -> std::io::Result<()>,
{
    let prev_len = file.metadata()?.len();
    let result = write(file, bytes).and_then(|_| file.sync_data());
    let Err(error) = result else {
        return Ok(());
    };

    if let Err(e) = file.set_len(prev_len).and_then(|_| file.sync_data()) {
        tracing::error!("Failed to roll back partial append to {} bytes: {}", prev_len, e);
    }
    Err(error.into())
}

/// Append-only JSONL sink
pub struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    /// Opens (or creates) the sink, repairing a torn tail first
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        repair_torn_tail(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, records: &[CommentRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut batch = String::with_capacity(records.len() * 512);
        for record in records {
            batch.push_str(&serde_json::to_string(record)?);
            batch.push('\n');
        }

        append_or_rollback(&mut self.file, batch.as_bytes(), |file, bytes| {
            file.write_all(bytes)
        })
    }

    fn read_all(&self) -> StorageResult<Vec<CommentRecord>> {
        read_records(&self.path)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
