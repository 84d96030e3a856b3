//! On-disk layout of runs and batch sources
//!
//! ```text
//! <base>/<subreddit>/                 source root (batch mode)
//!     config_used.toml
//!     visited_posts.txt               source-cumulative visited log
//!     batch_metadata.json
//!     runs/
//!         run_<id>_<sub>_<listing>[_<window>][_limit<N>]/
//!             comments.jsonl
//!             comments.sqlite
//!             visited_posts.txt       run-local visited log
//!             crawler.log
//!             metadata.json
//!         combined/comments.jsonl
//! ```

use crate::config::Strategy;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

pub const RECORDS_FILE: &str = "comments.jsonl";
pub const SNAPSHOT_FILE: &str = "comments.sqlite";
pub const VISITED_FILE: &str = "visited_posts.txt";
pub const LOG_FILE: &str = "crawler.log";
pub const METADATA_FILE: &str = "metadata.json";
pub const BATCH_METADATA_FILE: &str = "batch_metadata.json";
pub const CONFIG_SNAPSHOT_FILE: &str = "config_used.toml";
pub const SUMMARY_FILE: &str = "summary.json";
pub const RUNS_DIR: &str = "runs";
pub const COMBINED_DIR: &str = "combined";

const RUN_PREFIX: &str = "run_";

/// Microsecond timestamp of the last id handed out by this process
static LAST_RUN_MICROS: AtomicI64 = AtomicI64::new(0);

/// New run id: UTC timestamp to the microsecond plus 8 random hex digits
///
/// Ids sort in creation order, which the first-seen-wins merges rely on. Within one
/// process the timestamp part is strictly increasing.
pub fn run_id() -> String {
    let now = Utc::now().timestamp_micros();
    let micros = match LAST_RUN_MICROS.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    }) {
        Ok(last) | Err(last) => now.max(last + 1),
    };
    let stamp = DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_else(Utc::now);

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", stamp.format("%Y%m%d_%H%M%S_%6f"), &suffix[..8])
}

/// Directory name for one run
///
/// # Examples
///
/// ```
/// use reddit_harvest::config::Strategy;
/// use reddit_harvest::output::layout::run_dir_name;
///
/// let strategy: Strategy = "top:week".parse().unwrap();
/// assert_eq!(
///     run_dir_name("20240101_000000_000000_abcd1234", "greece", &strategy, Some(50)),
///     "run_20240101_000000_000000_abcd1234_greece_top_week_limit50"
/// );
/// ```
pub fn run_dir_name(run_id: &str, subreddit: &str, strategy: &Strategy, cap: Option<u32>) -> String {
    let mut name = format!("{}{}_{}_{}", RUN_PREFIX, run_id, subreddit, strategy.slug());
    if let Some(cap) = cap {
        name.push_str(&format!("_limit{}", cap));
    }
    name
}

/// Root directory of a source in batch mode
pub fn source_root(base_dir: &Path, subreddit: &str) -> PathBuf {
    base_dir.join(subreddit)
}

/// Run directories under `dir`, oldest first
///
/// Run names start with a sortable timestamp, so name order is creation order. A
/// missing directory has no runs.
pub fn list_run_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_run = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(RUN_PREFIX));
        if is_run && entry.file_type()?.is_dir() {
            runs.push(entry.path());
        }
    }
    runs.sort();
    Ok(runs)
}
