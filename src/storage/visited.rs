//! Persistent visited-post set
//!
//! The on-disk form is an append-only log with one post id per line. Ids are only ever
//! appended, so a crash mid-write can at worst leave a torn final line, which is
//! repaired on the next open.

use crate::storage::jsonl::{read_complete_lines, repair_torn_tail};
use crate::storage::traits::StorageResult;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads the ids recorded in a visited log (missing file reads as empty)
pub fn read_visited_log(path: &Path) -> StorageResult<Vec<String>> {
    Ok(read_complete_lines(path)?
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

struct VisitedLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl VisitedLog {
    fn open(path: &Path) -> StorageResult<(Self, Vec<String>)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        repair_torn_tail(path)?;
        let existing = read_visited_log(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok((
            Self {
                path: path.to_path_buf(),
                writer: BufWriter::new(file),
            },
            existing,
        ))
    }

    fn append(&mut self, id: &str) -> StorageResult<()> {
        self.writer.write_all(id.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn persist(&mut self) -> StorageResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Monotonically growing set of processed post ids for one source
///
/// Marks go to the primary log (source-cumulative) and, while one is attached, to the
/// run-local log of the active session.
pub struct VisitedSetStore {
    ids: HashSet<String>,
    primary: VisitedLog,
    run_log: Option<VisitedLog>,
}

impl VisitedSetStore {
    /// Loads the union of the primary log and any seed logs
    ///
    /// # Arguments
    ///
    /// * `primary` - Log that receives new marks; created if missing
    /// * `seeds` - Extra logs merged into the set but never written
    pub fn load(primary: &Path, seeds: &[PathBuf]) -> StorageResult<Self> {
        let (log, existing) = VisitedLog::open(primary)?;
        let mut ids: HashSet<String> = existing.into_iter().collect();
        for seed in seeds {
            ids.extend(read_visited_log(seed)?);
        }

        tracing::debug!(
            "Loaded {} visited posts from {}",
            ids.len(),
            primary.display()
        );

        Ok(Self {
            ids,
            primary: log,
            run_log: None,
        })
    }

    /// Attaches a run-local log, merging its prior content into the set
    ///
    /// Attaching the primary log itself is a no-op.
    pub fn attach_run_log(&mut self, path: &Path) -> StorageResult<()> {
        self.detach_run_log()?;
        if path == self.primary.path {
            return Ok(());
        }

        let (log, existing) = VisitedLog::open(path)?;
        self.ids.extend(existing);
        self.run_log = Some(log);
        Ok(())
    }

    /// Persists and drops the attached run-local log
    pub fn detach_run_log(&mut self) -> StorageResult<()> {
        if let Some(mut log) = self.run_log.take() {
            log.persist()?;
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Records a post as visited
    ///
    /// Idempotent: an id already in the set is not appended again.
    ///
    /// # Returns
    ///
    /// `true` if the id was newly added.
    pub fn mark(&mut self, id: &str) -> StorageResult<bool> {
        if self.ids.contains(id) {
            return Ok(false);
        }

        self.primary.append(id)?;
        if let Some(log) = self.run_log.as_mut() {
            log.append(id)?;
        }
        self.ids.insert(id.to_string());
        Ok(true)
    }

    /// Flushes pending appends to durable storage
    pub fn persist(&mut self) -> StorageResult<()> {
        self.primary.persist()?;
        if let Some(log) = self.run_log.as_mut() {
            log.persist()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary.path
    }

    /// Sorted copy of the current set
    pub fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}
