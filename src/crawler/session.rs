//! One (subreddit, strategy) crawl run
//!
//! This module contains the per-run crawl loop, including:
//! - Listing posts through the retry policy
//! - Expanding each post's comment tree with an explicit work queue
//! - Applying the language gates and buffering qualifying comments
//! - Marking posts visited only after the flush that holds their comments
//! - Honoring cancellation between posts and finalizing run metadata on every exit

use crate::config::{Config, Strategy};
use crate::crawler::api::{ApiError, Comment, CommentNode, Post, RedditApi};
use crate::crawler::retry::{RetryPolicy, TerminalError};
use crate::language::LanguageClassifier;
use crate::logging;
use crate::output::layout::{LOG_FILE, METADATA_FILE, VISITED_FILE};
use crate::output::{BufferedWriter, CommentRecord, RunMetadata};
use crate::state::{CancellationFlag, SessionState};
use crate::storage::{ExitStatus, VisitedSetStore};
use crate::{HarvestError, Result};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument::WithSubscriber;

/// Result of one finished session
#[derive(Debug)]
pub struct SessionReport {
    pub metadata: RunMetadata,
    pub run_dir: PathBuf,
    /// Posts newly marked visited by this session
    pub visited_added: usize,
    /// Session-fatal error, when the run ended in `error`
    pub error: Option<HarvestError>,
}

impl SessionReport {
    pub fn status(&self) -> ExitStatus {
        self.metadata.exit_status
    }
}

/// How a single post ended
enum PostOutcome {
    /// Comments buffered; the post is pending until the next flush
    Collected { comments: usize },
    Skipped,
    /// Cancelled after expansion; nothing buffered, not marked
    Abandoned,
}

/// Drives a single crawl run
pub struct CrawlSession<'a> {
    api: &'a dyn RedditApi,
    config: &'a Config,
    subreddit: String,
    strategy: Strategy,
    run_dir: PathBuf,
    visited: &'a mut VisitedSetStore,
    cancel: CancellationFlag,
    retry: RetryPolicy,
    classifier: LanguageClassifier,
    state: SessionState,
    config_hash: Option<String>,
    resumed: bool,
    visited_added: usize,
}

impl<'a> CrawlSession<'a> {
    /// Creates a session in the `Init` state
    ///
    /// # Arguments
    ///
    /// * `api` - Remote API used for listings and comment trees
    /// * `config` - Validated configuration
    /// * `subreddit` - Source to crawl
    /// * `strategy` - Listing strategy for this run
    /// * `run_dir` - Directory receiving the run's files; created if missing
    /// * `visited` - The source's visited set, shared with later runs
    /// * `cancel` - Flag checked between posts
    pub fn new(
        api: &'a dyn RedditApi,
        config: &'a Config,
        subreddit: &str,
        strategy: Strategy,
        run_dir: &Path,
        visited: &'a mut VisitedSetStore,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            api,
            config,
            subreddit: subreddit.to_string(),
            strategy,
            run_dir: run_dir.to_path_buf(),
            visited,
            cancel,
            retry: RetryPolicy::new(&config.retry),
            classifier: LanguageClassifier::new(&config.language),
            state: SessionState::Init,
            config_hash: None,
            resumed: false,
            visited_added: 0,
        }
    }

    pub fn with_config_hash(mut self, hash: Option<String>) -> Self {
        self.config_hash = hash;
        self
    }

    /// Marks the run as continuing an existing run directory
    pub fn resuming(mut self, resumed: bool) -> Self {
        self.resumed = resumed;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, to: SessionState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::trace!("Session state {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Runs the session to completion
    ///
    /// Never fails: a session-fatal error ends the run in `error` and is returned in
    /// the report. Log lines emitted during the run also go to the run's log file.
    pub async fn run(self) -> SessionReport {
        let dispatch = fs::create_dir_all(&self.run_dir)
            .and_then(|_| logging::run_dispatch(&self.run_dir.join(LOG_FILE)));

        match dispatch {
            Ok(dispatch) => self.execute().with_subscriber(dispatch).await,
            Err(e) => {
                tracing::warn!(
                    "Run log unavailable for {}: {}",
                    self.run_dir.display(),
                    e
                );
                self.execute().await
            }
        }
    }

    async fn execute(mut self) -> SessionReport {
        let run_id = self
            .run_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut metadata = RunMetadata::start(
            &run_id,
            &self.subreddit,
            self.strategy,
            self.config,
            self.config_hash.clone(),
        );
        metadata.resumed = self.resumed;

        let metadata_path = self.run_dir.join(METADATA_FILE);
        if let Err(e) = metadata.save(&metadata_path) {
            tracing::warn!("Failed to write initial metadata: {}", e);
        }

        tracing::info!(
            "Starting run for r/{} ({}), {} posts already visited",
            self.subreddit,
            self.strategy,
            self.visited.len()
        );

        let mut files = Vec::new();
        let outcome = match BufferedWriter::open(&self.run_dir, self.config.output.buffer_size) {
            Ok(mut writer) => {
                files = writer.files();
                let result = match self.crawl(&mut writer, &mut metadata).await {
                    Ok(status) => self.finish(&mut writer, status).map(|_| status),
                    Err(e) => Err(e),
                };
                if result.is_err() {
                    self.salvage(&mut writer);
                }
                result
            }
            Err(e) => Err(e.into()),
        };

        let (status, error) = match outcome {
            Ok(status) => (status, None),
            Err(e) => {
                tracing::error!("Run for r/{} ({}) failed: {}", self.subreddit, self.strategy, e);
                self.state = SessionState::Error;
                (ExitStatus::Error, Some(e))
            }
        };

        for extra in [VISITED_FILE, LOG_FILE] {
            let path = self.run_dir.join(extra);
            if path.exists() {
                files.push(path);
            }
        }
        files.push(metadata_path.clone());
        metadata.files_written = files.iter().map(|p| p.display().to_string()).collect();
        metadata.finish(status, error.as_ref().map(|e| e.to_string()));

        if let Err(e) = metadata.save(&metadata_path) {
            tracing::error!("Failed to write run metadata: {}", e);
        }

        tracing::info!(
            "Run finished with status {}: {} posts processed, {} skipped, {} comments",
            status,
            metadata.posts_processed,
            metadata.posts_skipped,
            metadata.comments_collected
        );

        SessionReport {
            metadata,
            run_dir: self.run_dir,
            visited_added: self.visited_added,
            error,
        }
    }

    /// Lists posts and processes them one at a time
    ///
    /// # Returns
    ///
    /// `Completed` when the listing (or the post cap) was exhausted, `Interrupted` when
    /// cancellation stopped the loop.
    async fn crawl(
        &mut self,
        writer: &mut BufferedWriter,
        metadata: &mut RunMetadata,
    ) -> Result<ExitStatus> {
        self.transition(SessionState::Listing)?;
        let posts = self.list_posts().await?;
        tracing::info!(
            "Listed {} posts for r/{} ({})",
            posts.len(),
            self.subreddit,
            self.strategy
        );

        let cap = self.config.crawling.post_cap();
        let post_sleep = Duration::from_millis(self.config.crawling.post_sleep_ms);
        let mut handled: u32 = 0;

        for post in &posts {
            if self.cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping before post {}", post.id);
                return Ok(ExitStatus::Interrupted);
            }
            if cap.is_some_and(|cap| handled >= cap) {
                tracing::info!("Post cap of {} reached", handled);
                break;
            }
            if self.visited.contains(&post.id) {
                tracing::debug!("Skipping visited post {}", post.id);
                continue;
            }
            handled += 1;

            self.transition(SessionState::ProcessingPost)?;
            match self.process_post(post, writer).await? {
                PostOutcome::Collected { comments } => {
                    metadata.posts_processed += 1;
                    metadata.comments_collected += comments as u64;
                }
                PostOutcome::Skipped => metadata.posts_skipped += 1,
                PostOutcome::Abandoned => {
                    tracing::info!(
                        "Cancellation requested, abandoning post {} before buffering",
                        post.id
                    );
                    return Ok(ExitStatus::Interrupted);
                }
            }

            if writer.should_flush() {
                self.flush(writer)?;
            }

            if !post_sleep.is_zero() {
                tokio::time::sleep(post_sleep).await;
            }
        }

        Ok(ExitStatus::Completed)
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let api = self.api;
        let subreddit = self.subreddit.as_str();
        let strategy = &self.strategy;
        let cap = self.config.crawling.post_cap();

        self.retry
            .execute(
                &format!("listing r/{} ({})", subreddit, strategy),
                || api.list_posts(subreddit, strategy, cap),
                ApiError::class,
            )
            .await
            .map_err(|source| HarvestError::ListingFetch {
                subreddit: subreddit.to_string(),
                strategy: strategy.to_string(),
                source,
            })
    }

    async fn process_post(
        &mut self,
        post: &Post,
        writer: &mut BufferedWriter,
    ) -> Result<PostOutcome> {
        tracing::debug!("Processing post {}: {}", post.id, post.title);

        if !self.classifier.accepts_title(&post.title) {
            tracing::debug!("Post {} skipped by the title gate", post.id);
            writer.complete_post(&post.id);
            return Ok(PostOutcome::Skipped);
        }
        if !self
            .classifier
            .accepts_original_post(&post.title, &post.selftext)
        {
            tracing::debug!("Post {} skipped by the original-post gate", post.id);
            writer.complete_post(&post.id);
            return Ok(PostOutcome::Skipped);
        }

        self.transition(SessionState::ExpandingComments)?;
        let comments = match self.expand_comments(post).await {
            Ok(comments) => comments,
            Err(failure) if failure.is_exhausted() => {
                tracing::warn!("Skipping post {} for now: {}", post.id, failure);
                return Ok(PostOutcome::Skipped);
            }
            Err(failure) => {
                tracing::warn!("Skipping post {}: {}", post.id, failure);
                writer.complete_post(&post.id);
                return Ok(PostOutcome::Skipped);
            }
        };

        if self.cancel.is_cancelled() {
            return Ok(PostOutcome::Abandoned);
        }

        self.transition(SessionState::Filtering)?;
        let mut kept = 0;
        for comment in &comments {
            if !self.classifier.accepts_comment(&comment.body) {
                continue;
            }
            writer.add(CommentRecord::new(post, comment));
            kept += 1;
        }
        writer.complete_post(&post.id);

        tracing::info!(
            "Post {}: kept {} of {} comments",
            post.id,
            kept,
            comments.len()
        );
        Ok(PostOutcome::Collected { comments: kept })
    }

    /// Fetches a post's comment tree and resolves every "more" stub
    ///
    /// Breadth-first over an explicit queue, so thread depth never grows the stack.
    /// A stub that fails permanently is dropped; an exhausted one fails the whole post.
    async fn expand_comments(
        &self,
        post: &Post,
    ) -> std::result::Result<Vec<Comment>, TerminalError<ApiError>> {
        let api = self.api;
        let roots = self
            .retry
            .execute(
                &format!("comment tree of {}", post.id),
                || api.fetch_comment_tree(post),
                ApiError::class,
            )
            .await?;

        let mut queue: VecDeque<CommentNode> = roots.into();
        let mut seen: HashSet<String> = HashSet::new();
        let mut comments = Vec::new();

        while let Some(node) = queue.pop_front() {
            match node {
                CommentNode::Comment { comment, replies } => {
                    queue.extend(replies);
                    if seen.insert(comment.id.clone()) {
                        comments.push(comment);
                    }
                }
                CommentNode::More(more) => {
                    let label = format!("more comments {} of {}", more.id, post.id);
                    match self
                        .retry
                        .execute(&label, || api.fetch_more(post, &more), ApiError::class)
                        .await
                    {
                        Ok(nodes) => queue.extend(nodes),
                        Err(TerminalError::Permanent { error }) => {
                            tracing::warn!(
                                "Dropping unexpandable comments {} of post {}: {}",
                                more.id,
                                post.id,
                                error
                            );
                        }
                        Err(exhausted) => return Err(exhausted),
                    }
                }
            }
        }

        Ok(comments)
    }

    /// Flushes the buffer, then marks the posts it released
    fn flush(&mut self, writer: &mut BufferedWriter) -> Result<()> {
        self.transition(SessionState::Flushing)?;
        let released = writer.flush()?;
        self.mark_all(&released)
    }

    fn mark_all(&mut self, post_ids: &[String]) -> Result<()> {
        for id in post_ids {
            if self.visited.mark(id)? {
                self.visited_added += 1;
            }
        }
        self.visited.persist()?;
        Ok(())
    }

    fn finish(&mut self, writer: &mut BufferedWriter, status: ExitStatus) -> Result<usize> {
        self.flush(writer)?;
        self.transition(SessionState::Finalizing)?;
        let rows = writer.finalize()?;
        self.visited.persist()?;
        self.transition(match status {
            ExitStatus::Completed => SessionState::Done,
            _ => SessionState::Interrupted,
        })?;
        Ok(rows)
    }

    /// Best-effort flush after a fatal error; the error itself is already decided
    fn salvage(&mut self, writer: &mut BufferedWriter) {
        let result = writer
            .flush()
            .map_err(HarvestError::from)
            .and_then(|released| self.mark_all(&released));
        if let Err(e) = result {
            tracing::error!("Failed to flush buffered records after error: {}", e);
        }
    }
}
