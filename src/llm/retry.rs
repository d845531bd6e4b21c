//! Shared exponential backoff retry logic for provider CLIs.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::{debug, warn};

/// Configuration: 3 total attempts, base 1s, max 30s.
pub const MAX_ATTEMPTS: u32 = 3;
const INITIAL_INTERVAL_SECS: u64 = 1;
const MAX_INTERVAL_SECS: u64 = 30;

/// Retry an async operation with exponential backoff.
///
/// `attempt` is called up to `MAX_ATTEMPTS` times. Errors for which
/// `is_retryable` returns false (a missing binary, say) are returned at once
/// without waiting. After the last failed attempt `wrap_exhausted` turns the
/// error into the caller's `RetriesExhausted` variant.
pub async fn retry_with_backoff<T, E, Fut, F, R, W>(
    mut attempt: F,
    is_retryable: R,
    wrap_exhausted: W,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    W: FnOnce(E) -> E,
    E: std::fmt::Display,
{
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_secs(INITIAL_INTERVAL_SECS),
        max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempts = 0;
    loop {
        attempts += 1;

        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !is_retryable(&err) {
            debug!("Not retrying: {err}");
            return Err(err);
        }
        if attempts >= MAX_ATTEMPTS {
            warn!("All {MAX_ATTEMPTS} attempts failed. Last error: {err}");
            return Err(wrap_exhausted(err));
        }

        if let Some(wait_duration) = backoff.next_backoff() {
            debug!(
                "Attempt {attempts} failed ({err}), retrying in {:?}",
                wait_duration
            );
            tokio::time::sleep(wait_duration).await;
        }
    }
}
