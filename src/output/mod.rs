//! Output module for crawl records and run documents
//!
//! This module handles:
//! - The flattened comment record and its buffered, crash-safe writer
//! - Run directory layout and naming
//! - Run and batch metadata documents
//! - Deduplicating merges of run outputs
//! - Console summaries

pub mod layout;
pub mod merge;
pub mod metadata;
mod record;
pub mod stats;
mod writer;

pub use merge::{combine_run_dirs, merge_runs, CombineSummary, MergeStats};
pub use metadata::{BatchMetadata, ComboOutcome, CombinedOutput, RunMetadata};
pub use record::{CommentRecord, DELETED_AUTHOR, PERMALINK_BASE};
pub use stats::{print_batch_summary, print_combine_summary, print_run_summary};
pub use writer::BufferedWriter;
