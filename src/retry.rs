//! Bounded retry with exponential backoff for transient network failures.
//!
//! [`RetryPolicy`] decides whether a failure is worth another attempt by
//! looking for known substrings in its message, and how long to wait before
//! the next one. [`retry`] and [`retry_observed`] drive an async operation
//! under that policy.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of times the operation is invoked.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound for a single backoff delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Case-sensitive substrings marking an error message as transient.
    #[serde(default = "default_retryable_errors")]
    pub retryable_errors: Vec<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_retryable_errors() -> Vec<String> {
    [
        "socket hang up",
        "Connection reset",
        "connection reset",
        "connection closed before message completed",
        "timed out",
        "timeout",
        "dns error",
        "failed to lookup address",
        "Connection refused",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            retryable_errors: default_retryable_errors(),
        }
    }
}

impl RetryPolicy {
    /// Calculate the delay that follows a failed `attempt` (1-based).
    /// delay = min(backoff_base_ms * 2^(attempt - 1), backoff_max_ms)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }

    /// Whether an error message matches one of the transient markers.
    pub fn is_retryable(&self, message: &str) -> bool {
        self.retryable_errors
            .iter()
            .any(|marker| message.contains(marker.as_str()))
    }
}

/// Runs `operation` under `policy`, returning its first success or the last
/// failure unchanged.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_observed(policy, operation, |_, _| {}).await
}

/// Like [`retry`], calling `on_retry(attempt, &error)` once before each
/// backoff sleep. The final failure does not reach the observer.
pub async fn retry_observed<T, E, F, Fut, O>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: O,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    O: FnMut(u32, &E),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let message = err.to_string();
        if attempt >= max_attempts || !policy.is_retryable(&message) {
            return Err(err);
        }

        let delay = policy.delay_for_attempt(attempt);
        warn!(
            "Operation failed (attempt {attempt}/{max_attempts}): {message}. Retrying in {}ms...",
            delay.as_millis()
        );
        on_retry(attempt, &err);
        sleep(delay).await;
        attempt += 1;
    }
}
