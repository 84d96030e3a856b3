//! Reddit-Harvest: a resumable, deduplicating subreddit crawler
//!
//! This crate retrieves posts and their full comment trees from Reddit, filters them by
//! language, and persists them in a form that survives interruption. Multiple listing
//! strategies can be run against the same subreddit and their outputs merged into one
//! deduplicated stream.

pub mod config;
pub mod crawler;
pub mod language;
pub mod logging;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Reddit-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to list posts for r/{subreddit} ({strategy}): {source}")]
    ListingFetch {
        subreddit: String,
        strategy: String,
        source: crawler::TerminalError<crawler::ApiError>,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("Invalid session state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::SessionState,
        to: state::SessionState,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// All of these are raised at startup, before any crawl session runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid combo identifier '{0}' (expected `listing` or `listing:window`)")]
    InvalidCombo(String),

    #[error("Unsupported language code: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Reddit-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, Strategy};
pub use crawler::{BatchOrchestrator, CrawlSession, RedditApi, RetryPolicy};
pub use language::{Language, LanguageClassifier};
pub use output::{BufferedWriter, CommentRecord};
pub use state::{CancellationFlag, SessionState};
pub use storage::{ExitStatus, VisitedSetStore};
