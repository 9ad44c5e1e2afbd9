//! Condition polling: wait until an async predicate holds or a timeout passes.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

/// The predicate did not hold before the configured timeout elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Timeout of {}ms exceeded while waiting for condition", .timeout.as_millis())]
pub struct TimeoutError {
    pub timeout: Duration,
}

/// Evaluates `predicate` every `interval` until it returns `Ok(true)`.
///
/// The elapsed time is checked before each evaluation, so the predicate runs
/// at most `ceil(timeout / interval) + 1` times. Errors from the predicate
/// itself are returned as-is; the poller only schedules.
pub async fn wait_for<F, Fut, E>(
    mut predicate: F,
    timeout: Duration,
    interval: Duration,
) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<TimeoutError>,
{
    let started = Instant::now();

    loop {
        if started.elapsed() >= timeout {
            return Err(TimeoutError { timeout }.into());
        }
        if predicate().await? {
            return Ok(());
        }
        sleep(interval).await;
    }
}
