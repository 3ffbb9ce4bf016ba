use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// High-level classification of an error for retry purposes.
///
/// Callers map HTTP status codes, curl errors, or free-form messages into
/// these kinds; only [`ErrorKind::is_retryable`] kinds are re-attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection-level failure before any status code was received.
    Transport,
    /// Operation timed out (HTTP 408 or transport timeout).
    Timeout,
    /// Server asked us to slow down (403 secondary limits, 429).
    RateLimited,
    /// HTTP 5xx.
    Server(u16),
    /// HTTP 401. Retrying cannot fix a bad token.
    Authentication,
    /// HTTP 404. Retrying cannot create the resource.
    NotFound,
    /// Anything else (not retried).
    Other,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        match self {
            ErrorKind::Transport
            | ErrorKind::Timeout
            | ErrorKind::RateLimited
            | ErrorKind::Server(_) => true,
            ErrorKind::Authentication | ErrorKind::NotFound | ErrorKind::Other => false,
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// How the wait between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `base * attempt`
    Linear,
    /// `base * 2^(attempt - 1)`
    #[default]
    Exponential,
}

/// Observer invoked before each retry with the 1-based number of the attempt
/// that just failed, how that failure was classified, and the error itself.
pub type RetryObserver = Arc<dyn Fn(u32, ErrorKind, &dyn fmt::Display) + Send + Sync>;

/// Per-operation retry parameters.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first). Values below 1 act as 1.
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    pub backoff: Backoff,
    pub on_retry: Option<RetryObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            backoff: Backoff::Exponential,
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("backoff", &self.backoff)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff,
            on_retry: None,
        }
    }

    /// Returns a copy of this policy that reports retries to `observer`.
    pub fn with_on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, ErrorKind, &dyn fmt::Display) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Decide whether the failure of `attempt` (1-based) with `kind` is retried.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts.max(1) || !kind.is_retryable() {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(calculate_delay(attempt, self.base_delay, self.backoff))
    }
}

/// Wait before the retry that follows the failed `attempt` (1-based).
pub fn calculate_delay(attempt: u32, base: Duration, backoff: Backoff) -> Duration {
    let attempt = attempt.max(1);
    match backoff {
        Backoff::Linear => base.saturating_mul(attempt),
        Backoff::Exponential => {
            let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
            base.saturating_mul(factor)
        }
    }
}
