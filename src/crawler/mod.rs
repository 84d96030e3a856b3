//! Crawler module for listing posts and collecting their comments
//!
//! This module contains the core crawling logic, including:
//! - The remote API seam and its HTTP implementation
//! - Listing/comment JSON parsing
//! - Bounded, classified retries
//! - The per-run crawl session and the multi-strategy batch orchestrator

mod api;
mod batch;
mod client;
mod parser;
mod retry;
mod session;

pub use api::{ApiError, Comment, CommentNode, ErrorClass, MoreComments, Post, RedditApi};
pub use batch::{BatchOrchestrator, BatchReport};
pub use client::{build_http_client, resolve_user_agent, Credentials, RedditClient};
pub use parser::{
    parse_comment_page, parse_listing, parse_more_children, parse_thread_continuation,
    ListingPage,
};
pub use retry::{RetryPolicy, TerminalError, MAX_ATTEMPTS};
pub use session::{CrawlSession, SessionReport};

use crate::config::{Config, Strategy};
use crate::output::layout::{self, METADATA_FILE, RUNS_DIR, VISITED_FILE};
use crate::output::RunMetadata;
use crate::state::CancellationFlag;
use crate::storage::VisitedSetStore;
use crate::Result;
use std::path::{Path, PathBuf};

/// Runs one fresh crawl of a subreddit with the given strategy
///
/// The run directory is created under `<base>/<subreddit>/runs/`. The run is seeded from
/// the subreddit's cumulative visited log and adds its marks to it.
///
/// # Arguments
///
/// * `api` - Remote API
/// * `config` - Validated configuration
/// * `subreddit` - Source to crawl
/// * `strategy` - Listing strategy
/// * `cancel` - Cancellation flag checked between posts
/// * `config_hash` - Hash of the config file, recorded in run metadata
///
/// # Returns
///
/// * `Ok(SessionReport)` - The run ended (in any status)
/// * `Err(HarvestError)` - The visited logs could not be opened or persisted
pub async fn crawl_subreddit(
    api: &dyn RedditApi,
    config: &Config,
    subreddit: &str,
    strategy: Strategy,
    cancel: CancellationFlag,
    config_hash: Option<String>,
) -> Result<SessionReport> {
    let root = layout::source_root(Path::new(&config.output.base_dir), subreddit);
    let run_dir = root.join(RUNS_DIR).join(layout::run_dir_name(
        &layout::run_id(),
        subreddit,
        &strategy,
        config.crawling.post_cap(),
    ));
    run_in_dir(
        api, config, subreddit, strategy, &root, &run_dir, false, cancel, config_hash,
    )
    .await
}

/// Continues an earlier run in its own directory
///
/// Subreddit and strategy are read back from the run's metadata. Posts in the run's
/// visited log or the cumulative log are skipped; new records append to the same sinks.
pub async fn resume_run(
    api: &dyn RedditApi,
    config: &Config,
    run_dir: &Path,
    cancel: CancellationFlag,
    config_hash: Option<String>,
) -> Result<SessionReport> {
    let previous = RunMetadata::load(&run_dir.join(METADATA_FILE))?;
    tracing::info!(
        "Resuming run {} (r/{}, {}), previous status {}",
        previous.run_id,
        previous.subreddit,
        previous.strategy,
        previous.exit_status
    );

    let root = source_root_of_run(run_dir).unwrap_or_else(|| {
        layout::source_root(Path::new(&config.output.base_dir), &previous.subreddit)
    });
    run_in_dir(
        api,
        config,
        &previous.subreddit,
        previous.strategy,
        &root,
        run_dir,
        true,
        cancel,
        config_hash,
    )
    .await
}

/// `<root>` for a run laid out as `<root>/runs/<run>`
fn source_root_of_run(run_dir: &Path) -> Option<PathBuf> {
    let runs = run_dir.parent()?;
    if runs.file_name()? != RUNS_DIR {
        return None;
    }
    runs.parent().map(Path::to_path_buf)
}

#[allow(clippy::too_many_arguments)]
async fn run_in_dir(
    api: &dyn RedditApi,
    config: &Config,
    subreddit: &str,
    strategy: Strategy,
    root: &Path,
    run_dir: &Path,
    resumed: bool,
    cancel: CancellationFlag,
    config_hash: Option<String>,
) -> Result<SessionReport> {
    let mut visited = VisitedSetStore::load(&root.join(VISITED_FILE), &[])?;
    visited.attach_run_log(&run_dir.join(VISITED_FILE))?;

    let report = CrawlSession::new(api, config, subreddit, strategy, run_dir, &mut visited, cancel)
        .with_config_hash(config_hash)
        .resuming(resumed)
        .run()
        .await;

    visited.detach_run_log()?;
    visited.persist()?;
    Ok(report)
}
