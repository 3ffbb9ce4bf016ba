//! Remote repository store.
//!
//! The archive service talks to the repository only through [`RepoStore`]:
//! read a path (file or directory), create or update a file, delete a file.
//! [`GitHubStore`] implements it over the GitHub contents API;
//! [`MemoryStore`] keeps everything in process for tests.

mod github;
mod memory;

pub use github::{GitHubStore, DEFAULT_API_BASE};
pub use memory::MemoryStore;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::StoreError;

/// Kind of a directory-listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, submodules, and anything newer the API may report.
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

/// A file as stored in the repository, with the revision needed to change it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub revision_id: String,
    pub bytes: Vec<u8>,
}

/// Result of reading a path: either a file or a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    File(StoredFile),
    Directory(Vec<DirEntry>),
}

/// Revision of a file that already exists at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRevision {
    pub revision_id: String,
}

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Web URL of the written file, when the backend knows it.
    pub html_url: Option<String>,
    pub revision_id: String,
}

/// File content encoded for transfer (standard base64, no line breaks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContent(String);

impl EncodedContent {
    pub fn encode(bytes: &[u8]) -> Self {
        EncodedContent(STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>, StoreError> {
        decode_base64(&self.0)
    }
}

/// Decodes base64 that may be wrapped across lines, as the contents API returns it.
pub(crate) fn decode_base64(text: &str) -> Result<Vec<u8>, StoreError> {
    let compact: String = text.split_whitespace().collect();
    Ok(STANDARD.decode(compact)?)
}

#[async_trait]
pub trait RepoStore: Send + Sync {
    /// Reads `path` on the store's branch.
    async fn get_content(&self, path: &str) -> Result<Content, StoreError>;

    /// Creates `path`, or replaces it when `revision_id` names its current revision.
    async fn create_or_update(
        &self,
        path: &str,
        content: &EncodedContent,
        message: &str,
        revision_id: Option<&str>,
    ) -> Result<WriteOutcome, StoreError>;

    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        revision_id: &str,
    ) -> Result<(), StoreError>;

    /// Current revision of the file at `path`, or `None` if nothing is there.
    ///
    /// Only a 404 means "absent"; every other failure is returned.
    async fn lookup_revision(&self, path: &str) -> Result<Option<ExistingRevision>, StoreError> {
        match self.get_content(path).await {
            Ok(Content::File(file)) => Ok(Some(ExistingRevision {
                revision_id: file.revision_id,
            })),
            Ok(Content::Directory(_)) => Err(StoreError::InvalidPath(format!(
                "{} is a directory",
                path
            ))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_content_roundtrip_and_wrapped_input() {
        let enc = EncodedContent::encode(b"hello archive");
        assert_eq!(enc.as_str(), "aGVsbG8gYXJjaGl2ZQ==");
        assert_eq!(enc.decode().unwrap(), b"hello archive");
        assert_eq!(
            decode_base64("aGVsbG8g\nYXJjaGl2\nZQ==\n").unwrap(),
            b"hello archive"
        );
        assert!(decode_base64("not base64!").is_err());
    }
}
