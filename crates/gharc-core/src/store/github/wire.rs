//! JSON shapes of the GitHub contents API.

use serde::{Deserialize, Serialize};

use crate::store::{DirEntry, EntryKind};

/// `GET /repos/{owner}/{repo}/contents/{path}` answers with an array for
/// directories and an object for files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum ContentsResponse {
    Listing(Vec<ListingEntry>),
    File(FileObject),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum EntryType {
    File,
    Dir,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListingEntry {
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub name: String,
    pub path: String,
}

impl From<ListingEntry> for DirEntry {
    fn from(e: ListingEntry) -> Self {
        let kind = match e.kind {
            EntryType::File => EntryKind::File,
            EntryType::Dir => EntryKind::Dir,
            EntryType::Other => EntryKind::Other,
        };
        DirEntry {
            name: e.name,
            path: e.path,
            kind,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct FileObject {
    pub path: String,
    pub sha: String,
    /// Base64 with embedded newlines; empty for files above the API's inline limit.
    #[serde(default)]
    pub content: String,
    /// `"base64"`, or `"none"` when the content was too large to inline.
    #[serde(default)]
    pub encoding: Option<String>,
}

impl FileObject {
    pub fn is_inline(&self) -> bool {
        self.encoding.as_deref() == Some("base64")
    }
}

#[derive(Debug, Serialize)]
pub(super) struct PutBody<'a> {
    pub message: &'a str,
    pub content: &'a str,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct DeleteBody<'a> {
    pub message: &'a str,
    pub sha: &'a str,
    pub branch: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct PutResponse {
    pub content: PutContent,
}

#[derive(Debug, Deserialize)]
pub(super) struct PutContent {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    pub message: String,
}
