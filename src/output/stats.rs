//! Console summaries of runs, batches and combines
//!
//! This module prints the end-of-command reports from the metadata documents.

use crate::output::merge::CombineSummary;
use crate::output::metadata::{BatchMetadata, RunMetadata};

/// Prints a finished run to stdout
///
/// # Arguments
///
/// * `meta` - Finalized run metadata
pub fn print_run_summary(meta: &RunMetadata) {
    println!("=== Run Summary: r/{} ({}) ===\n", meta.subreddit, meta.strategy);

    println!("Overview:");
    println!("  Run id: {}", meta.run_id);
    println!("  Status: {}", meta.exit_status);
    if let Some(duration) = meta.duration_seconds {
        println!("  Duration: {:.1}s", duration);
    }
    if meta.resumed {
        println!("  Resumed from an earlier attempt");
    }
    println!();

    println!("Counts:");
    println!("  Posts processed: {}", meta.posts_processed);
    println!("  Posts skipped: {}", meta.posts_skipped);
    println!("  Comments collected: {}", meta.comments_collected);
    let per_post = if meta.posts_processed > 0 {
        meta.comments_collected as f64 / meta.posts_processed as f64
    } else {
        0.0
    };
    println!("  Comments per post: {:.1}", per_post);
    println!();

    if let Some(error) = &meta.error {
        println!("Error: {}", error);
        println!();
    }

    println!("Files ({}):", meta.files_written.len());
    for file in &meta.files_written {
        println!("  - {}", file);
    }
    println!();
}

/// Prints one source's batch to stdout
pub fn print_batch_summary(meta: &BatchMetadata) {
    println!("=== Batch Summary: r/{} ===\n", meta.subreddit);

    println!("Combos ({}):", meta.combinations.len());
    for combo in &meta.combinations {
        let key = combo.to_string();
        match meta.outcome(&key) {
            Some(outcome) => {
                println!(
                    "  {:<22} {:<12} posts: {:>5}  comments: {:>7}  new visited: {:>5}",
                    key,
                    outcome.status.to_string(),
                    outcome.posts_processed,
                    outcome.comments_collected,
                    outcome.visited_added
                );
                if let Some(error) = &outcome.error {
                    println!("  {:<22} error: {}", "", error);
                }
            }
            None => println!("  {:<22} not run", key),
        }
    }
    println!();

    println!("Unique posts visited: {}", meta.total_unique_posts);
    if let Some(combined) = &meta.combined {
        println!(
            "Combined output: {} unique of {} read ({})",
            combined.stats.unique_written, combined.stats.total_read, combined.comments_file
        );
    }
    if meta.interrupted {
        println!("Batch was interrupted before all combos ran");
    }
    println!();
}

/// Prints the result of an offline combine
pub fn print_combine_summary(summary: &CombineSummary) {
    println!("=== Combine Summary ===\n");
    println!("  Runs merged: {}", summary.runs.len());
    println!("  Lines read: {}", summary.total_read);
    println!("  Unique comments: {}", summary.unique_written);
    println!("  Dropped (post owned by earlier run): {}", summary.dropped_not_owner);
    println!("  Unique posts: {}", summary.unique_posts);
    println!("  Output: {}", summary.comments_file);
}
