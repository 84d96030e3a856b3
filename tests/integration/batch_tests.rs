//! Multi-strategy batches and offline combines

use crate::common::*;
use reddit_harvest::config::Strategy;
use reddit_harvest::crawler::{ApiError, BatchOrchestrator, BatchReport};
use reddit_harvest::output::layout::{
    BATCH_METADATA_FILE, COMBINED_DIR, CONFIG_SNAPSHOT_FILE, RECORDS_FILE, VISITED_FILE,
};
use reddit_harvest::output::{combine_run_dirs, BatchMetadata};
use reddit_harvest::storage::{read_visited_log, ExitStatus};
use reddit_harvest::{CancellationFlag, Config};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

fn combos(ids: &[&str]) -> Vec<Strategy> {
    ids.iter().map(|id| id.parse().unwrap()).collect()
}

async fn run_batch(api: &FakeApi, config: &Config, combos: &[Strategy]) -> BatchReport {
    BatchOrchestrator::new(api, config, CancellationFlag::new())
        .run(&[SUBREDDIT.to_string()], combos)
        .await
}

fn combined_file(base: &Path) -> std::path::PathBuf {
    runs_dir(base).join(COMBINED_DIR).join(RECORDS_FILE)
}

fn visited(base: &Path) -> BTreeSet<String> {
    read_visited_log(&base.join(SUBREDDIT).join(VISITED_FILE))
        .unwrap()
        .into_iter()
        .collect()
}

#[tokio::test]
async fn test_failed_combo_does_not_stop_batch() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut api = FakeApi::with_listing("top:week", &["p1", "p2"]);
    api.listing_errors
        .insert("new".to_string(), ApiError::Server { status: 503 });

    let report = run_batch(&api, &config, &combos(&["new", "top:week"])).await;

    assert!(report.any_error());
    assert_eq!(report.sources.len(), 1);
    let meta = &report.sources[0];

    let failed = meta.outcome("new").unwrap();
    assert_eq!(failed.status, ExitStatus::Error);
    assert!(failed.error.as_deref().unwrap().contains("503"));
    assert!(failed.failed_at.is_some());

    let ok = meta.outcome("top:week").unwrap();
    assert_eq!(ok.status, ExitStatus::Completed);
    assert_eq!(ok.posts_processed, 2);
    assert!(ok.failed_at.is_none());

    let expected: BTreeSet<String> = ["p1", "p2"].iter().flat_map(|p| standard_ids(p)).collect();
    assert_eq!(comment_ids(&combined_file(dir.path())), expected);

    let saved = BatchMetadata::load(&dir.path().join(SUBREDDIT).join(BATCH_METADATA_FILE)).unwrap();
    assert!(saved.any_error());
    assert_eq!(saved.combined.unwrap().stats.unique_written, 8);
}

#[tokio::test]
async fn test_combos_share_visited_set() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut api = FakeApi::with_listing("new", &["p1", "p2"]);
    api.set_listing("hot", &["p2", "p3"]);
    standard_tree(&mut api, "p3");

    let report = run_batch(&api, &config, &combos(&["new", "hot"])).await;

    assert!(!report.any_error());
    let meta = &report.sources[0];
    assert_eq!(meta.outcome("new").unwrap().visited_added, 2);
    assert_eq!(meta.outcome("hot").unwrap().visited_added, 1);
    assert_eq!(meta.total_unique_posts, 3);
    assert_eq!(
        api.tree_calls(),
        vec!["p1".to_string(), "p2".to_string(), "p3".to_string()]
    );

    let combined = meta.combined.as_ref().unwrap();
    assert_eq!(combined.stats.total_read, 12);
    assert_eq!(combined.stats.unique_written, 12);

    let run_visited = read_visited_log(
        &Path::new(&meta.outcome("hot").unwrap().run_dir).join(VISITED_FILE),
    )
    .unwrap();
    assert_eq!(run_visited, vec!["p3".to_string()]);
}

#[tokio::test]
async fn test_rerun_is_stable_and_visited_only_grows() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut api = FakeApi::with_listing("new", &["p1", "p2"]);
    api.set_listing("top:week", &["p2", "p3"]);
    standard_tree(&mut api, "p3");
    let plan = combos(&["new", "top:week"]);

    run_batch(&api, &config, &plan).await;
    let first_visited = visited(dir.path());
    let first_ids = comment_ids(&combined_file(dir.path()));

    let report = run_batch(&api, &config, &plan).await;
    let second_visited = visited(dir.path());

    assert!(first_visited.is_subset(&second_visited));
    assert_eq!(second_visited.len(), 3);
    assert_eq!(comment_ids(&combined_file(dir.path())), first_ids);

    let meta = &report.sources[0];
    assert_eq!(meta.outcome("new").unwrap().posts_processed, 0);
    assert_eq!(meta.outcome("top:week").unwrap().visited_added, 0);
}

#[tokio::test]
async fn test_cancelled_batch_still_writes_metadata() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let api = FakeApi::with_listing("new", &["p1"]);
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let orchestrator = BatchOrchestrator::new(&api, &config, cancel);
    let meta = orchestrator
        .run_source(SUBREDDIT, &combos(&["new", "hot"]))
        .await
        .unwrap();

    assert!(meta.interrupted);
    assert!(meta.runs.is_empty());
    assert!(api.tree_calls().is_empty());

    let root = dir.path().join(SUBREDDIT);
    assert!(root.join(BATCH_METADATA_FILE).exists());
    assert!(root.join(CONFIG_SNAPSHOT_FILE).exists());
    assert!(combined_file(dir.path()).exists());
}

#[tokio::test]
async fn test_config_snapshot_round_trips() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let api = FakeApi::with_listing("new", &["p1"]);

    run_batch(&api, &config, &combos(&["new"])).await;

    let snapshot =
        std::fs::read_to_string(dir.path().join(SUBREDDIT).join(CONFIG_SNAPSHOT_FILE)).unwrap();
    let reloaded = reddit_harvest::config::parse_config(&snapshot).unwrap();
    assert_eq!(reloaded.subreddits, config.subreddits);
    assert_eq!(reloaded.output.base_dir, config.output.base_dir);
}

#[tokio::test]
async fn test_combine_run_dirs_after_batch() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut api = FakeApi::with_listing("new", &["p1", "p2"]);
    api.set_listing("hot", &["p3"]);
    standard_tree(&mut api, "p3");

    run_batch(&api, &config, &combos(&["new", "hot"])).await;

    let runs = runs_dir(dir.path());
    let summary = combine_run_dirs(&runs).unwrap();

    assert_eq!(summary.runs.len(), 2);
    assert_eq!(summary.unique_written, 12);
    assert_eq!(summary.unique_posts, 3);
    assert_eq!(summary.dropped_not_owner, 0);
    let expected: BTreeSet<String> = ["p1", "p2", "p3"]
        .iter()
        .flat_map(|p| standard_ids(p))
        .collect();
    assert_eq!(comment_ids(&runs.join(COMBINED_DIR).join(RECORDS_FILE)), expected);
    assert_eq!(
        read_visited_log(&runs.join(COMBINED_DIR).join(VISITED_FILE)).unwrap(),
        vec!["p1".to_string(), "p2".to_string(), "p3".to_string()]
    );
}
