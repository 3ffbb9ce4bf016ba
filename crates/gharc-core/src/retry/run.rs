//! Retry loop: run an async operation until success or the policy says stop.

use std::fmt;
use std::future::Future;

use super::classify::Classify;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `operation` until it succeeds or the retry policy says to stop.
///
/// On a retryable failure the policy's observer is notified, then the task
/// sleeps for the backoff duration and tries again. The final error is
/// returned exactly as the operation produced it.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let kind = e.classify();
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        tracing::debug!(attempt, ?kind, "giving up: {}", e);
                        return Err(e);
                    }
                    RetryDecision::RetryAfter(delay) => {
                        tracing::warn!(
                            attempt,
                            max_attempts = policy.max_attempts,
                            ?kind,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after error: {}",
                            e
                        );
                        if let Some(observer) = &policy.on_retry {
                            observer(attempt, kind, &e);
                        }
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}
