//! End-to-end crawl sessions against the in-memory API

use crate::common::*;
use reddit_harvest::config::{Config, Strategy};
use reddit_harvest::crawler::{crawl_subreddit, resume_run, ApiError, CommentNode, SessionReport};
use reddit_harvest::output::layout::{
    LOG_FILE, METADATA_FILE, RUNS_DIR, SNAPSHOT_FILE, VISITED_FILE,
};
use reddit_harvest::output::{merge_runs, BufferedWriter, CommentRecord, RunMetadata};
use reddit_harvest::storage::{read_visited_log, ExitStatus, SqliteSnapshot, VisitedSetStore};
use reddit_harvest::{CancellationFlag, CrawlSession, HarvestError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn strategy() -> Strategy {
    "new".parse().unwrap()
}

async fn crawl(api: &FakeApi, config: &Config, cancel: CancellationFlag) -> SessionReport {
    crawl_subreddit(api, config, SUBREDDIT, strategy(), cancel, None)
        .await
        .unwrap()
}

fn cumulative_visited(base: &Path) -> BTreeSet<String> {
    read_visited_log(&base.join(SUBREDDIT).join(VISITED_FILE))
        .unwrap()
        .into_iter()
        .collect()
}

/// Runs a session in a fixed run directory so its files can be prepared beforehand
async fn run_in(api: &FakeApi, config: &Config, run_dir: &Path) -> SessionReport {
    let root = dir_root(config);
    let mut visited = VisitedSetStore::load(&root.join(VISITED_FILE), &[]).unwrap();
    let report = CrawlSession::new(
        api,
        config,
        SUBREDDIT,
        strategy(),
        run_dir,
        &mut visited,
        CancellationFlag::new(),
    )
    .run()
    .await;
    visited.persist().unwrap();
    report
}

fn dir_root(config: &Config) -> PathBuf {
    Path::new(&config.output.base_dir).join(SUBREDDIT)
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn all_ids(posts: &[&str]) -> BTreeSet<String> {
    posts.iter().flat_map(|p| standard_ids(p)).collect()
}

#[tokio::test]
async fn test_full_run_collects_expanded_trees() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let api = FakeApi::with_listing("new", &["p1", "p2"]);

    let report = crawl(&api, &config, CancellationFlag::new()).await;

    assert_eq!(report.status(), ExitStatus::Completed);
    assert!(report.error.is_none());
    assert_eq!(report.metadata.posts_processed, 2);
    assert_eq!(report.metadata.comments_collected, 8);
    assert_eq!(report.visited_added, 2);

    assert_eq!(
        comment_ids(&records_file(&report.run_dir)),
        all_ids(&["p1", "p2"])
    );
    assert_eq!(
        SqliteSnapshot::count_rows(&report.run_dir.join(SNAPSHOT_FILE)).unwrap(),
        8
    );
    assert_eq!(cumulative_visited(dir.path()), set(&["p1", "p2"]));
    assert_eq!(
        read_visited_log(&report.run_dir.join(VISITED_FILE)).unwrap(),
        vec!["p1".to_string(), "p2".to_string()]
    );
}

#[tokio::test]
async fn test_records_join_post_and_comment_fields() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let api = FakeApi::with_listing("new", &["p1"]);

    let report = crawl(&api, &config, CancellationFlag::new()).await;
    let records = reddit_harvest::storage::read_records(&records_file(&report.run_dir)).unwrap();

    let reply: &CommentRecord = records.iter().find(|r| r.comment_id == "p1_c1r").unwrap();
    assert_eq!(reply.post_id, "p1");
    assert_eq!(reply.subreddit, SUBREDDIT);
    assert_eq!(
        reply.permalink,
        "https://www.reddit.com/r/greece/comments/p1/post/"
    );
    assert_eq!(reply.parent_id, "t1_p1_c1");
    assert_eq!(reply.depth, 1);
    assert_eq!(reply.author_post, "op");
}

#[tokio::test]
async fn test_post_cap_limits_processed_posts() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.crawling.post_limit = 2;
    let api = FakeApi::with_listing("new", &["p1", "p2", "p3"]);

    let report = crawl(&api, &config, CancellationFlag::new()).await;

    assert_eq!(report.status(), ExitStatus::Completed);
    assert_eq!(report.metadata.posts_processed, 2);
    assert_eq!(report.metadata.post_limit, Some(2));
    assert_eq!(cumulative_visited(dir.path()), set(&["p1", "p2"]));
    assert_eq!(api.tree_calls(), vec!["p1".to_string(), "p2".to_string()]);
}

#[tokio::test]
async fn test_cancel_during_second_post() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let cancel = CancellationFlag::new();
    let mut api = FakeApi::with_listing("new", &["p1", "p2", "p3"]);
    api.cancel_during = Some(("p2".to_string(), cancel.clone()));

    let report = crawl(&api, &config, cancel).await;

    assert_eq!(report.status(), ExitStatus::Interrupted);
    assert!(report.error.is_none());
    assert_eq!(report.metadata.posts_processed, 1);
    assert_eq!(cumulative_visited(dir.path()), set(&["p1"]));
    assert_eq!(comment_ids(&records_file(&report.run_dir)), all_ids(&["p1"]));
    assert_eq!(api.tree_calls(), vec!["p1".to_string(), "p2".to_string()]);

    let saved = RunMetadata::load(&report.run_dir.join(METADATA_FILE)).unwrap();
    assert_eq!(saved.exit_status, ExitStatus::Interrupted);
    assert!(saved.end_time.is_some());
}

#[tokio::test]
async fn test_resume_reprocesses_only_remaining_posts() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let cancel = CancellationFlag::new();
    let mut api = FakeApi::with_listing("new", &["p1", "p2", "p3"]);
    api.cancel_during = Some(("p2".to_string(), cancel.clone()));
    let interrupted = crawl(&api, &config, cancel).await;

    let api = FakeApi::with_listing("new", &["p1", "p2", "p3"]);
    let resumed = resume_run(
        &api,
        &config,
        &interrupted.run_dir,
        CancellationFlag::new(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(resumed.status(), ExitStatus::Completed);
    assert!(resumed.metadata.resumed);
    assert_eq!(resumed.run_dir, interrupted.run_dir);
    assert_eq!(api.tree_calls(), vec!["p2".to_string(), "p3".to_string()]);

    let scratch_dir = TempDir::new().unwrap();
    let scratch_config = test_config(scratch_dir.path());
    let scratch = crawl(
        &FakeApi::with_listing("new", &["p1", "p2", "p3"]),
        &scratch_config,
        CancellationFlag::new(),
    )
    .await;

    assert_eq!(
        comment_ids(&records_file(&resumed.run_dir)),
        comment_ids(&records_file(&scratch.run_dir))
    );
    assert_eq!(cumulative_visited(dir.path()), set(&["p1", "p2", "p3"]));
}

#[tokio::test]
async fn test_crash_between_flush_and_mark_is_replayed_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let run_dir = runs_dir(dir.path()).join("run_20240101_000000_00000000_greece_new");

    // Records of p1 were flushed, then the process died before p1 was marked
    let mut writer = BufferedWriter::open(&run_dir, 100).unwrap();
    let source = post("p1");
    for id in standard_ids("p1") {
        writer.add(CommentRecord::new(&source, &comment(&id, "t3_p1", "x", 0)));
    }
    writer.complete_post("p1");
    writer.flush().unwrap();
    drop(writer);
    RunMetadata::start("crashed", SUBREDDIT, strategy(), &config, None)
        .save(&run_dir.join(METADATA_FILE))
        .unwrap();

    assert!(cumulative_visited(dir.path()).is_empty());
    assert!(read_visited_log(&run_dir.join(VISITED_FILE))
        .unwrap()
        .is_empty());

    let api = FakeApi::with_listing("new", &["p1", "p2"]);
    let report = resume_run(&api, &config, &run_dir, CancellationFlag::new(), None)
        .await
        .unwrap();

    assert_eq!(report.status(), ExitStatus::Completed);
    assert_eq!(api.tree_calls(), vec!["p1".to_string(), "p2".to_string()]);

    let merged = dir.path().join("merged.jsonl");
    let stats = merge_runs(&[records_file(&run_dir)], &merged).unwrap();
    assert_eq!(stats.total_read, 12);
    assert_eq!(stats.unique_written, 8);
    assert_eq!(comment_ids(&merged), all_ids(&["p1", "p2"]));
}

#[tokio::test]
async fn test_small_buffer_flushes_during_run() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.output.buffer_size = 1;
    let api = FakeApi::with_listing("new", &["p1", "p2", "p3"]);

    let report = crawl(&api, &config, CancellationFlag::new()).await;

    assert_eq!(report.status(), ExitStatus::Completed);
    assert_eq!(
        comment_ids(&records_file(&report.run_dir)),
        all_ids(&["p1", "p2", "p3"])
    );
    assert_eq!(cumulative_visited(dir.path()), set(&["p1", "p2", "p3"]));
}

#[tokio::test]
async fn test_no_target_language_accepts_everything() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    assert!(config.language.target.is_none());

    let mut api = FakeApi::with_listing("new", &["p1"]);
    let parent = "t3_p1";
    api.trees.insert(
        "p1".to_string(),
        vec![
            CommentNode::leaf(comment("a", parent, "Plain English text", 0)),
            CommentNode::leaf(comment("b", parent, "Καλημέρα σε όλους", 0)),
            CommentNode::leaf(comment("c", parent, "🙂🙂", 0)),
            CommentNode::leaf(comment("d", parent, "", 0)),
        ],
    );

    let report = crawl(&api, &config, CancellationFlag::new()).await;

    assert_eq!(report.metadata.comments_collected, 4);
    assert_eq!(
        comment_ids(&records_file(&report.run_dir)),
        set(&["a", "b", "c", "d"])
    );
}

#[tokio::test]
async fn test_language_gates_filter_posts_and_comments() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.language.target = Some("el".parse().unwrap());

    let mut api = FakeApi::default();
    let mut greek = post("gr");
    greek.title = "Ποιο είναι το καλύτερο νησί για διακοπές το καλοκαίρι;".to_string();
    let mut english = post("en");
    english.title = "Which island is the best one for a summer holiday?".to_string();
    api.listings
        .insert("new".to_string(), vec![greek.clone(), english.clone()]);
    api.trees.insert(
        "gr".to_string(),
        vec![
            CommentNode::leaf(comment(
                "keep",
                "t3_gr",
                "Η Νάξος είναι πανέμορφη και έχει υπέροχες παραλίες.",
                0,
            )),
            CommentNode::leaf(comment(
                "drop",
                "t3_gr",
                "Naxos is beautiful and has wonderful beaches.",
                0,
            )),
        ],
    );

    let report = crawl(&api, &config, CancellationFlag::new()).await;

    assert_eq!(report.metadata.posts_processed, 1);
    assert_eq!(report.metadata.posts_skipped, 1);
    assert_eq!(comment_ids(&records_file(&report.run_dir)), set(&["keep"]));
    // Gate skips are final, the English post is not fetched again
    assert_eq!(api.tree_calls(), vec!["gr".to_string()]);
    assert_eq!(cumulative_visited(dir.path()), set(&["en", "gr"]));
}

#[tokio::test]
async fn test_permanent_and_exhausted_failures_skip_posts() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut api = FakeApi::with_listing("new", &["gone", "flaky", "ok"]);
    api.tree_errors.insert("gone".to_string(), ApiError::NotFound);
    api.tree_errors
        .insert("flaky".to_string(), ApiError::Server { status: 503 });

    let report = crawl(&api, &config, CancellationFlag::new()).await;

    assert_eq!(report.status(), ExitStatus::Completed);
    assert_eq!(report.metadata.posts_processed, 1);
    assert_eq!(report.metadata.posts_skipped, 2);
    // Permanent failures are marked; exhausted retries are left for the next run
    assert_eq!(cumulative_visited(dir.path()), set(&["gone", "ok"]));

    let calls = api.tree_calls();
    assert_eq!(calls.iter().filter(|id| *id == "gone").count(), 1);
    assert_eq!(calls.iter().filter(|id| *id == "flaky").count(), 5);
}

#[tokio::test]
async fn test_unexpandable_stub_is_dropped() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut api = FakeApi::with_listing("new", &["p1"]);
    api.more.clear();

    let report = crawl(&api, &config, CancellationFlag::new()).await;

    assert_eq!(report.status(), ExitStatus::Completed);
    assert_eq!(report.metadata.comments_collected, 3);
    assert_eq!(cumulative_visited(dir.path()), set(&["p1"]));
}

#[tokio::test]
async fn test_listing_failure_ends_run_in_error() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut api = FakeApi::with_listing("new", &["p1"]);
    api.listing_errors
        .insert("new".to_string(), ApiError::Server { status: 502 });

    let report = crawl(&api, &config, CancellationFlag::new()).await;

    assert_eq!(report.status(), ExitStatus::Error);
    assert!(matches!(
        report.error,
        Some(HarvestError::ListingFetch { .. })
    ));
    assert!(api.tree_calls().is_empty());

    let saved = RunMetadata::load(&report.run_dir.join(METADATA_FILE)).unwrap();
    assert_eq!(saved.exit_status, ExitStatus::Error);
    assert!(saved.error.unwrap().contains("gave up after 5 attempts"));
}

#[tokio::test]
async fn test_metadata_lists_written_files() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let api = FakeApi::with_listing("new", &["p1"]);

    let report = crawl(&api, &config, CancellationFlag::new()).await;
    let files = &report.metadata.files_written;

    for name in ["comments.jsonl", SNAPSHOT_FILE, VISITED_FILE, LOG_FILE, METADATA_FILE] {
        assert!(
            files.iter().any(|f| f.ends_with(name)),
            "{} missing from {:?}",
            name,
            files
        );
    }
    assert!(report.run_dir.join(LOG_FILE).exists());
    assert_eq!(report.metadata.config_snapshot["subreddits"][0], SUBREDDIT);
}

#[tokio::test]
async fn test_unopenable_sink_ends_run_in_error() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let api = FakeApi::with_listing("new", &["p1"]);

    let run_dir = runs_dir(dir.path()).join("run_blocked");
    std::fs::create_dir_all(records_file(&run_dir)).unwrap();

    let report = run_in(&api, &config, &run_dir).await;

    assert_eq!(report.status(), ExitStatus::Error);
    assert!(matches!(report.error, Some(HarvestError::Persistence(_))));
    assert!(api.tree_calls().is_empty());

    let saved = RunMetadata::load(&run_dir.join(METADATA_FILE)).unwrap();
    assert_eq!(saved.exit_status, ExitStatus::Error);
    assert!(saved.error.is_some());
    assert!(cumulative_visited(dir.path()).is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_sink_write_failure_leaves_posts_unmarked() {
    let device = Path::new("/dev/full");
    if !device.exists() {
        return;
    }

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.output.buffer_size = 1;
    let api = FakeApi::with_listing("new", &["p1", "p2"]);

    // Every write to /dev/full fails with ENOSPC
    let run_dir = dir.path().join(SUBREDDIT).join(RUNS_DIR).join("run_full");
    std::fs::create_dir_all(&run_dir).unwrap();
    std::os::unix::fs::symlink(device, records_file(&run_dir)).unwrap();

    let report = run_in(&api, &config, &run_dir).await;

    assert_eq!(report.status(), ExitStatus::Error);
    assert!(matches!(report.error, Some(HarvestError::Persistence(_))));
    assert_eq!(report.visited_added, 0);
    assert_eq!(api.tree_calls(), vec!["p1".to_string()]);

    let saved = RunMetadata::load(&run_dir.join(METADATA_FILE)).unwrap();
    assert_eq!(saved.exit_status, ExitStatus::Error);
    assert!(saved.error.unwrap().contains("Persistence"));
    assert!(cumulative_visited(dir.path()).is_empty());
    assert!(read_visited_log(&run_dir.join(VISITED_FILE)).unwrap().is_empty());
}
