//! Retry and backoff policy for remote repository calls.
//!
//! This module encapsulates error classification (transport failures,
//! throttling, server errors versus authentication and missing resources)
//! and linear/exponential backoff so every GitHub operation shares one policy.

mod classify;
mod policy;
mod run;

pub use classify::{
    classify_curl_error, classify_http_status, classify_message, Classify,
};
pub use policy::{calculate_delay, Backoff, ErrorKind, RetryDecision, RetryObserver, RetryPolicy};
pub use run::with_retry;
