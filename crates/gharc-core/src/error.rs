//! Error type for repository store and archive operations.

use thiserror::Error;

/// Failure of a remote repository call or of an archive transform.
///
/// Status-coded variants are produced from HTTP responses so the retry layer
/// can classify them without re-parsing messages.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP 401: the token is missing, expired, or lacks scope. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// HTTP 404: the path (or the repository) does not exist. Never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP 403 or 429: rate limited or temporarily forbidden.
    #[error("rate limited (HTTP {status}): {message}")]
    RateLimited { status: u16, message: String },

    /// HTTP 408. Transport timeouts arrive as [`StoreError::Transport`].
    #[error("request timed out: {0}")]
    Timeout(String),

    /// HTTP 5xx.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-2xx status.
    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Connection-level failure before a status code was received.
    #[error("network error: {0}")]
    Transport(#[from] curl::Error),

    /// An archive document lacks a structural marker it must have.
    #[error("corrupt archive document {path}: {reason}")]
    CorruptArchive { path: String, reason: String },

    /// The path names a directory (or otherwise not a file) where a file was required.
    #[error("invalid archive path: {0}")]
    InvalidPath(String),

    /// Caller-supplied data was rejected before any remote call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Response body could not be decoded (JSON, base64, or UTF-8).
    #[error("could not decode response: {0}")]
    Decode(String),

    /// Local I/O, e.g. a blocking task that failed to join.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Builds the variant matching an HTTP status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => StoreError::Authentication(message),
            404 => StoreError::NotFound(message),
            403 | 429 => StoreError::RateLimited { status, message },
            408 => StoreError::Timeout(message),
            500..=599 => StoreError::Server { status, message },
            _ => StoreError::Api { status, message },
        }
    }

    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Authentication(_) => Some(401),
            StoreError::NotFound(_) => Some(404),
            StoreError::RateLimited { status, .. }
            | StoreError::Server { status, .. }
            | StoreError::Api { status, .. } => Some(*status),
            StoreError::Timeout(_) => Some(408),
            StoreError::Transport(_)
            | StoreError::CorruptArchive { .. }
            | StoreError::InvalidPath(_)
            | StoreError::InvalidInput(_)
            | StoreError::Decode(_)
            | StoreError::Io(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}

impl From<base64::DecodeError> for StoreError {
    fn from(e: base64::DecodeError) -> Self {
        StoreError::Decode(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for StoreError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}
