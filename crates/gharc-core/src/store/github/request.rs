//! Blocking libcurl request for the GitHub REST API.
//!
//! Runs in the current thread; callers wrap it in `spawn_blocking`.

use std::time::Duration;

/// HTTP methods the contents API needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Everything needed to perform one request, owned so it can cross into a blocking task.
#[derive(Debug, Clone)]
pub(super) struct Request {
    pub method: Method,
    pub url: String,
    pub token: String,
    pub user_agent: String,
    pub accept: &'static str,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// Status and body of a completed exchange. Any status is a completed exchange.
#[derive(Debug, Clone)]
pub(super) struct Response {
    pub status: u32,
    pub body: Vec<u8>,
}

pub(super) fn perform(req: &Request) -> Result<Response, curl::Error> {
    let mut body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&req.url)?;
    easy.useragent(&req.user_agent)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(req.timeout)?;

    match req.method {
        Method::Get => easy.get(true)?,
        Method::Put | Method::Delete => {
            easy.custom_request(req.method.as_str())?;
            if let Some(payload) = &req.body {
                easy.post_fields_copy(payload)?;
            }
        }
    }

    let mut list = curl::easy::List::new();
    list.append(&format!("Accept: {}", req.accept))?;
    list.append("X-GitHub-Api-Version: 2022-11-28")?;
    if !req.token.is_empty() {
        list.append(&format!("Authorization: Bearer {}", req.token))?;
    }
    if req.body.is_some() {
        list.append("Content-Type: application/json")?;
        // No 100-continue round trip for JSON bodies.
        list.append("Expect:")?;
    }
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    tracing::debug!(method = req.method.as_str(), url = %req.url, status, "github request");
    Ok(Response { status, body })
}
