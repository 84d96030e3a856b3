//! Configuration module for Reddit-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The result is a statically shaped [`Config`]; combo identifiers and language codes
//! are checked here, before any crawl session starts.
//!
//! # Example
//!
//! ```no_run
//! use reddit_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawling {} subreddits", config.subreddits.len());
//! ```

mod parser;
mod strategy;
mod types;
mod validation;

// Re-export types
pub use strategy::{ListingKind, Strategy, TimeWindow};
pub use types::{
    ApiConfig, BatchConfig, Config, CrawlingConfig, LanguageConfig, OutputConfig, RetryConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate_combos, validate_subreddit_name};
