use crate::config::types::{ApiConfig, Config, CrawlingConfig, LanguageConfig, OutputConfig, RetryConfig};
use crate::config::Strategy;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_subreddits(&config.subreddits)?;
    validate_crawling_config(&config.crawling)?;
    validate_language_config(&config.language)?;
    validate_output_config(&config.output)?;
    validate_api_config(&config.api)?;
    validate_retry_config(&config.retry)?;
    validate_combos(&config.batch.combos)?;
    Ok(())
}

/// Validates the subreddit list
fn validate_subreddits(subreddits: &[String]) -> Result<(), ConfigError> {
    if subreddits.is_empty() {
        return Err(ConfigError::Validation(
            "subreddits must be a non-empty list of subreddit names".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for name in subreddits {
        validate_subreddit_name(name)?;
        if !seen.insert(name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "subreddit '{}' is listed more than once",
                name
            )));
        }
    }

    Ok(())
}

/// Validates a single subreddit name: 1-21 characters, alphanumeric or underscore
pub fn validate_subreddit_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.len() > 21 {
        return Err(ConfigError::Validation(format!(
            "subreddit name must be 1-21 characters, got '{}'",
            name
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "subreddit name must contain only letters, digits and underscores, got '{}'",
            name
        )));
    }

    Ok(())
}

/// Validates crawling configuration
fn validate_crawling_config(config: &CrawlingConfig) -> Result<(), ConfigError> {
    if config.timefilter.is_some() && !config.listing.is_windowed() {
        return Err(ConfigError::Validation(format!(
            "timefilter is only valid for top and controversial, not '{}'",
            config.listing.as_str()
        )));
    }

    Ok(())
}

/// Validates language gate configuration
fn validate_language_config(config: &LanguageConfig) -> Result<(), ConfigError> {
    if !config.min_script_ratio.is_finite() || !(0.0..=1.0).contains(&config.min_script_ratio) {
        return Err(ConfigError::Validation(format!(
            "min-script-ratio must be between 0.0 and 1.0, got {}",
            config.min_script_ratio
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.base_dir.is_empty() {
        return Err(ConfigError::Validation(
            "base-dir cannot be empty".to_string(),
        ));
    }

    if config.buffer_size < 1 {
        return Err(ConfigError::Validation(format!(
            "buffer-size must be >= 1, got {}",
            config.buffer_size
        )));
    }

    Ok(())
}

/// Validates remote API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("base-url", &config.base_url),
        ("auth-url", &config.auth_url),
        ("oauth-base-url", &config.oauth_base_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", key, e)))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                key, value
            )));
        }
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the retry backoff schedule
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry min-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Rejects duplicate combos; each identifier was already parsed on load
pub fn validate_combos(combos: &[Strategy]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for combo in combos {
        if !seen.insert(*combo) {
            return Err(ConfigError::Validation(format!(
                "combo '{}' is listed more than once",
                combo
            )));
        }
    }
    Ok(())
}
