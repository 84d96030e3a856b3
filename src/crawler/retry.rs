//! Bounded, classified retries for remote operations
//!
//! [`RetryPolicy`] is an explicit strategy object: it takes an operation and an error
//! classifier and returns either the result or a [`TerminalError`]. It never decides
//! what a failure means for the caller, and keeps no state between calls.

use crate::config::RetryConfig;
use crate::crawler::api::ErrorClass;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Attempt cap for transient failures
pub const MAX_ATTEMPTS: u32 = 5;

/// Final failure of a retried operation
#[derive(Debug)]
pub enum TerminalError<E> {
    /// Classified permanent; not retried
    Permanent { error: E },

    /// Still transient after the attempt cap
    Exhausted { attempts: u32, error: E },
}

impl<E> TerminalError<E> {
    /// The last underlying error
    pub fn error(&self) -> &E {
        match self {
            Self::Permanent { error } | Self::Exhausted { error, .. } => error,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Permanent { error } | Self::Exhausted { error, .. } => error,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

impl<E: fmt::Display> fmt::Display for TerminalError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent { error } => write!(f, "permanent failure: {}", error),
            Self::Exhausted { attempts, error } => {
                write!(f, "gave up after {} attempts: {}", attempts, error)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TerminalError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error())
    }
}

/// Exponential backoff with jitter and a fixed attempt cap
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    multiplier: Duration,
    min_delay: Duration,
    max_delay: Duration,
    jitter_ms: u64,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            multiplier: Duration::from_millis(config.multiplier_ms),
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ms: config.jitter_ms,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the `attempt`-th failure, before jitter
    ///
    /// `multiplier * 2^(attempt-1)` clamped to `[min_delay, max_delay]`; never shorter
    /// than the wait for an earlier attempt.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let raw = self.multiplier.saturating_mul(1u32 << exp);
        raw.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..self.jitter_ms))
    }

    /// Runs `operation` until it succeeds, fails permanently, or hits the attempt cap
    ///
    /// # Arguments
    ///
    /// * `label` - Short description used in log lines
    /// * `operation` - Produces a fresh future per attempt
    /// * `classify` - Decides whether an error is worth retrying
    pub async fn execute<T, E, F, Fut, C>(
        &self,
        label: &str,
        mut operation: F,
        classify: C,
    ) -> Result<T, TerminalError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if classify(&error) == ErrorClass::Permanent {
                return Err(TerminalError::Permanent { error });
            }

            if attempt >= self.max_attempts {
                return Err(TerminalError::Exhausted {
                    attempts: attempt,
                    error,
                });
            }

            let backoff = self.backoff_delay(attempt);
            tracing::warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                label,
                attempt,
                self.max_attempts,
                error,
                backoff
            );
            tokio::time::sleep(backoff + self.jitter()).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
