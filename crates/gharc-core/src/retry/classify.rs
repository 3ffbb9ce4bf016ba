//! Classify HTTP statuses, curl errors, and free-form errors into retry kinds.

use crate::error::StoreError;
use crate::retry::policy::ErrorKind;

/// Anything the retry loop can decide about.
pub trait Classify {
    fn classify(&self) -> ErrorKind;
}

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        401 => ErrorKind::Authentication,
        404 => ErrorKind::NotFound,
        403 | 429 => ErrorKind::RateLimited,
        408 => ErrorKind::Timeout,
        500..=u16::MAX => ErrorKind::Server(code),
        _ => ErrorKind::Other,
    }
}

/// Last-resort heuristic for errors without a status: a message that talks
/// about fetching or the network is treated as a transport failure.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("fetch") || lower.contains("network") {
        ErrorKind::Transport
    } else {
        ErrorKind::Other
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_ssl_connect_error()
        || e.is_partial_file()
    {
        return ErrorKind::Transport;
    }
    classify_message(e.description())
}

impl Classify for curl::Error {
    fn classify(&self) -> ErrorKind {
        classify_curl_error(self)
    }
}

impl Classify for StoreError {
    fn classify(&self) -> ErrorKind {
        match self {
            StoreError::Transport(e) => classify_curl_error(e),
            StoreError::Timeout(_) => ErrorKind::Timeout,
            StoreError::CorruptArchive { .. }
            | StoreError::InvalidPath(_)
            | StoreError::InvalidInput(_) => ErrorKind::Other,
            other => match other.status().map(classify_http_status) {
                Some(ErrorKind::Other) | None => classify_message(&other.to_string()),
                Some(kind) => kind,
            },
        }
    }
}

impl Classify for anyhow::Error {
    fn classify(&self) -> ErrorKind {
        if let Some(e) = self.downcast_ref::<StoreError>() {
            return e.classify();
        }
        if let Some(e) = self.downcast_ref::<curl::Error>() {
            return e.classify();
        }
        classify_message(&format!("{:#}", self))
    }
}
