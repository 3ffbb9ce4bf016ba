//! GitHub contents-API backend.
//!
//! Uses the curl crate (libcurl) in `spawn_blocking` so the async archive
//! operations never block the runtime. Every call targets one fixed branch.

mod request;
mod wire;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::codec::RepoCoords;
use crate::error::StoreError;
use crate::store::{
    decode_base64, Content, DirEntry, EncodedContent, RepoStore, StoredFile, WriteOutcome,
};

use request::{Method, Request, Response};
use wire::{ApiErrorBody, ContentsResponse, DeleteBody, PutBody, PutResponse};

/// Public GitHub REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";

/// [`RepoStore`] over `https://api.github.com/repos/{owner}/{repo}/contents`.
#[derive(Clone)]
pub struct GitHubStore {
    api_base: Url,
    coords: RepoCoords,
    token: String,
    user_agent: String,
    timeout: Duration,
}

impl fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubStore")
            .field("api_base", &self.api_base.as_str())
            .field("coords", &self.coords)
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GitHubStore {
    pub fn new(
        api_base: &str,
        coords: RepoCoords,
        token: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let api_base = Url::parse(api_base)
            .map_err(|e| StoreError::InvalidInput(format!("api base {:?}: {}", api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(StoreError::InvalidInput(format!(
                "api base {} cannot hold a path",
                api_base
            )));
        }
        Ok(Self {
            api_base,
            coords,
            token: token.into(),
            user_agent: concat!("gharc/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(60),
        })
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Upper bound for a whole request, transfer included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn coords(&self) -> &RepoCoords {
        &self.coords
    }

    /// `{api_base}/repos/{owner}/{repo}/contents/{path}` with each segment escaped.
    fn contents_url(&self, path: &str) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([
                    "repos",
                    self.coords.owner.as_str(),
                    self.coords.repo.as_str(),
                    "contents",
                ])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    fn read_url(&self, path: &str) -> String {
        let mut url = self.contents_url(path);
        url.query_pairs_mut().append_pair("ref", &self.coords.branch);
        url.into()
    }

    fn request(
        &self,
        method: Method,
        url: String,
        accept: &'static str,
        body: Option<Vec<u8>>,
    ) -> Request {
        Request {
            method,
            url,
            token: self.token.clone(),
            user_agent: self.user_agent.clone(),
            accept,
            body,
            timeout: self.timeout,
        }
    }

    async fn send(&self, req: Request, path: &str) -> Result<Response, StoreError> {
        let resp = tokio::task::spawn_blocking(move || request::perform(&req))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        check_status(resp, path)
    }

    async fn read_raw(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let req = self.request(Method::Get, self.read_url(path), ACCEPT_RAW, None);
        Ok(self.send(req, path).await?.body)
    }
}

/// Turns a non-2xx response into the matching status-coded error.
fn check_status(resp: Response, path: &str) -> Result<Response, StoreError> {
    if (200..300).contains(&resp.status) {
        return Ok(resp);
    }
    let detail = serde_json::from_slice::<ApiErrorBody>(&resp.body)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&resp.body).trim().to_string());
    let status = u16::try_from(resp.status).unwrap_or(u16::MAX);
    Err(StoreError::from_status(status, format!("{}: {}", path, detail)))
}

#[async_trait]
impl RepoStore for GitHubStore {
    async fn get_content(&self, path: &str) -> Result<Content, StoreError> {
        let req = self.request(Method::Get, self.read_url(path), ACCEPT_JSON, None);
        let resp = self.send(req, path).await?;
        match serde_json::from_slice::<ContentsResponse>(&resp.body)? {
            ContentsResponse::Listing(entries) => Ok(Content::Directory(
                entries.into_iter().map(DirEntry::from).collect(),
            )),
            ContentsResponse::File(file) => {
                let bytes = if file.is_inline() {
                    decode_base64(&file.content)?
                } else {
                    tracing::debug!(path, "content not inlined; fetching raw");
                    self.read_raw(path).await?
                };
                Ok(Content::File(StoredFile {
                    path: file.path,
                    revision_id: file.sha,
                    bytes,
                }))
            }
        }
    }

    async fn create_or_update(
        &self,
        path: &str,
        content: &EncodedContent,
        message: &str,
        revision_id: Option<&str>,
    ) -> Result<WriteOutcome, StoreError> {
        let body = serde_json::to_vec(&PutBody {
            message,
            content: content.as_str(),
            branch: &self.coords.branch,
            sha: revision_id,
        })?;
        let url = self.contents_url(path).into();
        let req = self.request(Method::Put, url, ACCEPT_JSON, Some(body));
        let resp = self.send(req, path).await?;
        let put: PutResponse = serde_json::from_slice(&resp.body)?;
        tracing::info!(path, revision = %put.content.sha, "wrote file");
        Ok(WriteOutcome {
            html_url: put.content.html_url,
            revision_id: put.content.sha,
        })
    }

    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        revision_id: &str,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_vec(&DeleteBody {
            message,
            sha: revision_id,
            branch: &self.coords.branch,
        })?;
        let url = self.contents_url(path).into();
        let req = self.request(Method::Delete, url, ACCEPT_JSON, Some(body));
        self.send(req, path).await?;
        tracing::info!(path, "deleted file");
        Ok(())
    }
}
