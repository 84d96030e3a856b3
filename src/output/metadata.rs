//! Run and batch metadata documents
//!
//! Both documents are rewritten whole through [`write_atomic`], so a crash leaves either
//! the previous version or the new one on disk.

use crate::config::{Config, Strategy};
use crate::output::merge::MergeStats;
use crate::storage::{write_atomic, ExitStatus, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Metadata of one crawl run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub subreddit: String,
    pub strategy: Strategy,
    pub post_limit: Option<u32>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub posts_processed: u64,
    pub posts_skipped: u64,
    pub comments_collected: u64,
    pub exit_status: ExitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the run continued an existing run directory
    #[serde(default)]
    pub resumed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    pub config_snapshot: serde_json::Value,
    pub files_written: Vec<String>,
}

impl RunMetadata {
    /// Starts metadata for a run that is about to begin
    pub fn start(
        run_id: &str,
        subreddit: &str,
        strategy: Strategy,
        config: &Config,
        config_hash: Option<String>,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            subreddit: subreddit.to_string(),
            strategy,
            post_limit: config.crawling.post_cap(),
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: None,
            posts_processed: 0,
            posts_skipped: 0,
            comments_collected: 0,
            exit_status: ExitStatus::Running,
            error: None,
            resumed: false,
            config_hash,
            config_snapshot: serde_json::to_value(config).unwrap_or(serde_json::Value::Null),
            files_written: Vec::new(),
        }
    }

    /// Records the final status and timing
    pub fn finish(&mut self, status: ExitStatus, error: Option<String>) {
        let end = Utc::now();
        self.duration_seconds = Some((end - self.start_time).num_milliseconds() as f64 / 1000.0);
        self.end_time = Some(end);
        self.exit_status = status;
        self.error = error;
    }

    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    pub fn load(path: &Path) -> StorageResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Outcome of one combo inside a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboOutcome {
    pub status: ExitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the combo ended in error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    pub posts_processed: u64,
    pub comments_collected: u64,
    /// Posts newly added to the source's visited set by this combo
    pub visited_added: usize,
    pub run_dir: String,
}

/// Combined-stream counts for one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedOutput {
    pub comments_file: String,
    #[serde(flatten)]
    pub stats: MergeStats,
}

/// Metadata of one source's batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub subreddit: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Combos in the order they were planned
    pub combinations: Vec<Strategy>,
    /// Keyed by combo identifier, e.g. `top:week`
    pub runs: BTreeMap<String, ComboOutcome>,
    pub total_unique_posts: usize,
    pub interrupted: bool,
    pub combined: Option<CombinedOutput>,
}

impl BatchMetadata {
    pub fn new(subreddit: &str, combinations: &[Strategy]) -> Self {
        Self {
            subreddit: subreddit.to_string(),
            start_time: Utc::now(),
            end_time: None,
            combinations: combinations.to_vec(),
            runs: BTreeMap::new(),
            total_unique_posts: 0,
            interrupted: false,
            combined: None,
        }
    }

    pub fn record(&mut self, combo: &Strategy, outcome: ComboOutcome) {
        self.runs.insert(combo.to_string(), outcome);
    }

    pub fn outcome(&self, combo: &str) -> Option<&ComboOutcome> {
        self.runs.get(combo)
    }

    pub fn any_error(&self) -> bool {
        self.runs.values().any(|o| o.status.is_error())
    }

    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    pub fn load(path: &Path) -> StorageResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
