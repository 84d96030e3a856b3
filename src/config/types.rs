use crate::config::strategy::{ListingKind, Strategy, TimeWindow};
use crate::language::Language;
use serde::{Deserialize, Serialize};

/// Main configuration structure for Reddit-Harvest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Subreddits to crawl, each kept separate in batch mode
    pub subreddits: Vec<String>,

    #[serde(default)]
    pub crawling: CrawlingConfig,

    #[serde(default)]
    pub language: LanguageConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Listing strategy and pacing for a single crawl run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlingConfig {
    /// Listing type (new, hot, rising, best, top, controversial)
    #[serde(default = "default_listing")]
    pub listing: ListingKind,

    /// Time window for `top` and `controversial`
    #[serde(default)]
    pub timefilter: Option<TimeWindow>,

    /// Maximum number of unvisited posts handled per run (0 = unlimited)
    #[serde(rename = "post-limit", default = "default_post_limit")]
    pub post_limit: u32,

    /// Delay after each post to stay under the remote rate limit (milliseconds)
    #[serde(rename = "post-sleep-ms", default = "default_post_sleep_ms")]
    pub post_sleep_ms: u64,
}

/// Language gates applied to posts and comments
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LanguageConfig {
    /// ISO 639-1 code of the target language; no filtering when absent
    #[serde(default)]
    pub target: Option<Language>,

    /// Skip posts whose title is not in the target language
    #[serde(rename = "require-title", default = "default_true")]
    pub require_title: bool,

    /// Skip posts whose title + selftext is not in the target language
    #[serde(rename = "require-op", default)]
    pub require_op: bool,

    /// Keep only comments in the target language
    #[serde(rename = "filter-comments", default = "default_true")]
    pub filter_comments: bool,

    /// Minimum share of script characters for the script-ratio fallback
    #[serde(rename = "min-script-ratio", default = "default_min_script_ratio")]
    pub min_script_ratio: f64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Root directory for run and batch output
    #[serde(rename = "base-dir", default = "default_base_dir")]
    pub base_dir: String,

    /// Number of buffered comments that triggers a flush
    #[serde(rename = "buffer-size", default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Remote API client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL for unauthenticated requests
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Token endpoint used when app credentials are available
    #[serde(rename = "auth-url", default = "default_auth_url")]
    pub auth_url: String,

    /// Base URL for requests made with an app-only token
    #[serde(rename = "oauth-base-url", default = "default_oauth_base_url")]
    pub oauth_base_url: String,

    /// Fallback user agent when the user-agent env variable is unset
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Name of the env variable holding the OAuth client id
    #[serde(rename = "client-id-env", default = "default_client_id_env")]
    pub client_id_env: String,

    /// Name of the env variable holding the OAuth client secret
    #[serde(rename = "client-secret-env", default = "default_client_secret_env")]
    pub client_secret_env: String,

    /// Name of the env variable overriding the user agent
    #[serde(rename = "user-agent-env", default = "default_user_agent_env")]
    pub user_agent_env: String,
}

/// Backoff schedule for transient remote failures
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Exponential multiplier: attempt n waits `multiplier * 2^(n-1)`
    #[serde(rename = "multiplier-ms", default = "default_retry_multiplier")]
    pub multiplier_ms: u64,

    #[serde(rename = "min-delay-ms", default = "default_retry_min")]
    pub min_delay_ms: u64,

    #[serde(rename = "max-delay-ms", default = "default_retry_max")]
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to each wait
    #[serde(rename = "jitter-ms", default = "default_retry_jitter")]
    pub jitter_ms: u64,
}

/// Batch orchestration settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Combo sequence; the full default sequence when empty
    #[serde(default)]
    pub combos: Vec<Strategy>,
}

impl Config {
    /// Strategy configured for single-run mode
    pub fn strategy(&self) -> Strategy {
        Strategy {
            listing: self.crawling.listing,
            window: match self.crawling.listing {
                ListingKind::Top | ListingKind::Controversial => {
                    Some(self.crawling.timefilter.unwrap_or(TimeWindow::All))
                }
                _ => None,
            },
        }
    }

    /// Combos to run in batch mode
    pub fn batch_combos(&self) -> Vec<Strategy> {
        if self.batch.combos.is_empty() {
            Strategy::default_sequence()
        } else {
            self.batch.combos.clone()
        }
    }
}

impl CrawlingConfig {
    /// Post cap as an option (`None` = unlimited)
    pub fn post_cap(&self) -> Option<u32> {
        (self.post_limit > 0).then_some(self.post_limit)
    }
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            listing: default_listing(),
            timefilter: None,
            post_limit: default_post_limit(),
            post_sleep_ms: default_post_sleep_ms(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            target: None,
            require_title: true,
            require_op: false,
            filter_comments: true,
            min_script_ratio: default_min_script_ratio(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_url: default_auth_url(),
            oauth_base_url: default_oauth_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            client_id_env: default_client_id_env(),
            client_secret_env: default_client_secret_env(),
            user_agent_env: default_user_agent_env(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            multiplier_ms: default_retry_multiplier(),
            min_delay_ms: default_retry_min(),
            max_delay_ms: default_retry_max(),
            jitter_ms: default_retry_jitter(),
        }
    }
}

fn default_listing() -> ListingKind {
    ListingKind::Top
}

fn default_post_limit() -> u32 {
    100
}

fn default_post_sleep_ms() -> u64 {
    400
}

fn default_true() -> bool {
    true
}

fn default_min_script_ratio() -> f64 {
    0.30
}

fn default_base_dir() -> String {
    "reddit_dump".to_string()
}

fn default_buffer_size() -> usize {
    2000
}

fn default_base_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}

fn default_oauth_base_url() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_user_agent() -> String {
    format!("reddit-harvest:v{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_client_id_env() -> String {
    "REDDIT_CLIENT_ID".to_string()
}

fn default_client_secret_env() -> String {
    "REDDIT_CLIENT_SECRET".to_string()
}

fn default_user_agent_env() -> String {
    "REDDIT_USER_AGENT".to_string()
}

fn default_retry_multiplier() -> u64 {
    1000
}

fn default_retry_min() -> u64 {
    2000
}

fn default_retry_max() -> u64 {
    30_000
}

fn default_retry_jitter() -> u64 {
    1000
}
