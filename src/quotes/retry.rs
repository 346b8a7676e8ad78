//! Bounded retry for transient quote provider failures

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry `operation` on transient errors, waiting `base_delay * attempt`
/// between attempts (1x, 2x, ...).
///
/// `max_retries` excludes the first call, so at most `max_retries + 1`
/// calls are made. Non-transient errors are returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(max_retries: u32, base_delay: Duration, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = base_delay * attempt;
                tracing::warn!(
                    "Quote request failed (attempt {}), retrying in {:?}: {}",
                    attempt,
                    delay,
                    e
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
