//! Deduplicating merges of run outputs
//!
//! Two entry points:
//! - [`merge_runs`]: first-seen-wins merge of JSONL files keyed by `comment_id`, used by
//!   batch mode after every source
//! - [`combine_run_dirs`]: offline merge of run directories with post ownership by the
//!   earliest run that visited the post

use crate::output::layout::{self, COMBINED_DIR, RECORDS_FILE, SUMMARY_FILE, VISITED_FILE};
use crate::storage::{read_complete_lines, read_visited_log, tmp_path, write_atomic, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Counts of a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Complete lines read across all inputs
    pub total_read: usize,
    /// Lines written after deduplication
    pub unique_written: usize,
}

/// Summary written by [`combine_run_dirs`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineSummary {
    pub runs: Vec<String>,
    pub total_read: usize,
    pub unique_written: usize,
    /// Lines dropped because another run owns their post
    pub dropped_not_owner: usize,
    pub unique_posts: usize,
    pub comments_file: String,
}

/// Deduplication key of one output line
///
/// The `comment_id` when the line carries a non-empty one, otherwise a SHA-256 of the
/// raw line.
fn dedup_key(line: &str, parsed: Option<&Value>) -> String {
    match parsed
        .and_then(|v| v.get("comment_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    {
        Some(id) => format!("id:{}", id),
        None => format!("sha256:{}", hex::encode(Sha256::digest(line.as_bytes()))),
    }
}

fn write_lines_atomic<'a>(dest: &Path, lines: impl IntoIterator<Item = &'a str>) -> StorageResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(dest);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for line in lines {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, dest)?;
    Ok(())
}

/// Merges JSONL files into `output`, keeping the first line seen per key
///
/// Inputs are read in the given order; missing inputs count as empty. The output is
/// replaced atomically.
///
/// # Arguments
///
/// * `inputs` - JSONL files, earliest first
/// * `output` - Destination of the merged stream
pub fn merge_runs(inputs: &[PathBuf], output: &Path) -> StorageResult<MergeStats> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<String> = Vec::new();
    let mut stats = MergeStats::default();

    for input in inputs {
        for line in read_complete_lines(input)? {
            stats.total_read += 1;
            let parsed = serde_json::from_str::<Value>(&line).ok();
            if seen.insert(dedup_key(&line, parsed.as_ref())) {
                merged.push(line);
            }
        }
    }

    write_lines_atomic(output, merged.iter().map(String::as_str))?;
    stats.unique_written = merged.len();

    tracing::info!(
        "Merged {} files into {}: {} read, {} unique",
        inputs.len(),
        output.display(),
        stats.total_read,
        stats.unique_written
    );
    Ok(stats)
}

/// Combines every run directory under `root` into `root/combined/`
///
/// A post belongs to the earliest run whose visited log lists it; that run's comments
/// for the post are kept and other runs' are dropped. Posts no visited log lists are
/// kept from every run. Remaining lines are deduplicated like [`merge_runs`].
pub fn combine_run_dirs(root: &Path) -> StorageResult<CombineSummary> {
    let runs = layout::list_run_dirs(root)?;
    let names: Vec<String> = runs
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        })
        .collect();

    let mut owner: HashMap<String, usize> = HashMap::new();
    let mut all_posts: BTreeSet<String> = BTreeSet::new();
    for (idx, run) in runs.iter().enumerate() {
        for post_id in read_visited_log(&run.join(VISITED_FILE))? {
            owner.entry(post_id.clone()).or_insert(idx);
            all_posts.insert(post_id);
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<String> = Vec::new();
    let mut total_read = 0;
    let mut dropped_not_owner = 0;

    for (idx, run) in runs.iter().enumerate() {
        for line in read_complete_lines(&run.join(RECORDS_FILE))? {
            total_read += 1;
            let parsed = serde_json::from_str::<Value>(&line).ok();

            let post_owner = parsed
                .as_ref()
                .and_then(|v| v.get("post_id"))
                .and_then(Value::as_str)
                .and_then(|post_id| owner.get(post_id));
            if matches!(post_owner, Some(&o) if o != idx) {
                dropped_not_owner += 1;
                continue;
            }

            if seen.insert(dedup_key(&line, parsed.as_ref())) {
                merged.push(line);
            }
        }
    }

    let combined_dir = root.join(COMBINED_DIR);
    let comments_file = combined_dir.join(RECORDS_FILE);
    write_lines_atomic(&comments_file, merged.iter().map(String::as_str))?;
    write_lines_atomic(
        &combined_dir.join(VISITED_FILE),
        all_posts.iter().map(String::as_str),
    )?;

    let summary = CombineSummary {
        runs: names,
        total_read,
        unique_written: merged.len(),
        dropped_not_owner,
        unique_posts: all_posts.len(),
        comments_file: comments_file.display().to_string(),
    };
    write_atomic(
        &combined_dir.join(SUMMARY_FILE),
        &serde_json::to_vec_pretty(&summary)?,
    )?;

    tracing::info!(
        "Combined {} runs under {}: {} read, {} unique, {} dropped as not owned",
        summary.runs.len(),
        root.display(),
        summary.total_read,
        summary.unique_written,
        summary.dropped_not_owner
    );
    Ok(summary)
}
