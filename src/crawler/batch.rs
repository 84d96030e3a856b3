//! Multi-strategy batches over one or more subreddits
//!
//! Sources run one after another and, within a source, combos run one after another.
//! All combos of a source share one [`VisitedSetStore`], persisted after every combo,
//! so later combos skip what earlier ones already took. A combo that ends in error is
//! recorded and the batch moves on.

use crate::config::{Config, Strategy};
use crate::crawler::api::RedditApi;
use crate::crawler::session::CrawlSession;
use crate::output::layout::{
    self, BATCH_METADATA_FILE, COMBINED_DIR, CONFIG_SNAPSHOT_FILE, RECORDS_FILE, RUNS_DIR,
    VISITED_FILE,
};
use crate::output::{merge_runs, BatchMetadata, ComboOutcome, CombinedOutput};
use crate::state::CancellationFlag;
use crate::storage::{write_atomic, ExitStatus, VisitedSetStore};
use crate::{HarvestError, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a whole batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Metadata of every source that ran
    pub sources: Vec<BatchMetadata>,
    /// Sources that could not be set up or merged
    pub failed_sources: Vec<(String, HarvestError)>,
    pub interrupted: bool,
}

impl BatchReport {
    /// True if any combo or source ended in error
    pub fn any_error(&self) -> bool {
        !self.failed_sources.is_empty() || self.sources.iter().any(BatchMetadata::any_error)
    }
}

/// Runs combo sequences per source and merges their outputs
pub struct BatchOrchestrator<'a> {
    api: &'a dyn RedditApi,
    config: &'a Config,
    base_dir: PathBuf,
    cancel: CancellationFlag,
    config_hash: Option<String>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(api: &'a dyn RedditApi, config: &'a Config, cancel: CancellationFlag) -> Self {
        Self {
            api,
            config,
            base_dir: PathBuf::from(&config.output.base_dir),
            cancel,
            config_hash: None,
        }
    }

    pub fn with_config_hash(mut self, hash: Option<String>) -> Self {
        self.config_hash = hash;
        self
    }

    /// Runs every combo for every source
    ///
    /// # Arguments
    ///
    /// * `sources` - Subreddits, processed in order
    /// * `combos` - Strategies, run in order for each source
    pub async fn run(&self, sources: &[String], combos: &[Strategy]) -> BatchReport {
        let mut report = BatchReport::default();

        for subreddit in sources {
            if self.cancel.is_cancelled() {
                tracing::info!("Cancellation requested, skipping remaining sources");
                report.interrupted = true;
                break;
            }

            match self.run_source(subreddit, combos).await {
                Ok(meta) => {
                    report.interrupted |= meta.interrupted;
                    report.sources.push(meta);
                }
                Err(e) => {
                    tracing::error!("Batch for r/{} failed: {}", subreddit, e);
                    report.failed_sources.push((subreddit.clone(), e));
                }
            }
        }

        report
    }

    /// Runs the combo sequence for one source, then merges its runs
    pub async fn run_source(&self, subreddit: &str, combos: &[Strategy]) -> Result<BatchMetadata> {
        let root = layout::source_root(&self.base_dir, subreddit);
        let runs_dir = root.join(RUNS_DIR);
        fs::create_dir_all(&runs_dir)?;
        self.write_config_snapshot(&root);

        let prior_runs = layout::list_run_dirs(&runs_dir)?;
        let mut visited = VisitedSetStore::load(&root.join(VISITED_FILE), &[])?;
        let mut meta = BatchMetadata::new(subreddit, combos);
        meta.total_unique_posts = visited.len();
        let meta_path = root.join(BATCH_METADATA_FILE);

        tracing::info!(
            "Batch for r/{}: {} combos, {} earlier runs, {} posts already visited",
            subreddit,
            combos.len(),
            prior_runs.len(),
            visited.len()
        );

        let cap = self.config.crawling.post_cap();
        let mut batch_runs: Vec<PathBuf> = Vec::new();

        for combo in combos {
            if self.cancel.is_cancelled() {
                tracing::info!("Cancellation requested, skipping remaining combos");
                meta.interrupted = true;
                break;
            }

            let run_dir = runs_dir.join(layout::run_dir_name(
                &layout::run_id(),
                subreddit,
                combo,
                cap,
            ));
            visited.attach_run_log(&run_dir.join(VISITED_FILE))?;

            let report = CrawlSession::new(
                self.api,
                self.config,
                subreddit,
                *combo,
                &run_dir,
                &mut visited,
                self.cancel.clone(),
            )
            .with_config_hash(self.config_hash.clone())
            .run()
            .await;

            visited.detach_run_log()?;
            visited.persist()?;

            let status = report.status();
            if status == ExitStatus::Interrupted {
                meta.interrupted = true;
            }
            meta.record(
                combo,
                ComboOutcome {
                    status,
                    error: report.error.as_ref().map(|e| e.to_string()),
                    failed_at: status.is_error().then(Utc::now),
                    posts_processed: report.metadata.posts_processed,
                    comments_collected: report.metadata.comments_collected,
                    visited_added: report.visited_added,
                    run_dir: run_dir.display().to_string(),
                },
            );
            meta.total_unique_posts = visited.len();
            meta.save(&meta_path)?;
            batch_runs.push(run_dir);
        }

        let inputs: Vec<PathBuf> = prior_runs
            .iter()
            .chain(batch_runs.iter())
            .map(|run| run.join(RECORDS_FILE))
            .collect();
        let combined_file = runs_dir.join(COMBINED_DIR).join(RECORDS_FILE);
        let stats = merge_runs(&inputs, &combined_file)?;

        meta.combined = Some(CombinedOutput {
            comments_file: combined_file.display().to_string(),
            stats,
        });
        meta.end_time = Some(Utc::now());
        meta.save(&meta_path)?;

        Ok(meta)
    }

    fn write_config_snapshot(&self, root: &Path) {
        let result = toml::to_string_pretty(self.config)
            .map_err(|e| e.to_string())
            .and_then(|toml| {
                write_atomic(&root.join(CONFIG_SNAPSHOT_FILE), toml.as_bytes())
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            tracing::warn!("Failed to write config snapshot for {}: {}", root.display(), e);
        }
    }
}
