//! Archive operations: what the front end calls.
//!
//! Every remote call goes through [`with_retry`] with the service's policy,
//! and archive text passes through the codec on the way in and out.

mod upload;

pub use upload::UploadTask;

use chrono::{DateTime, Local, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::codec::{self, CodecError, ArchiveHeader, FileLink, RepoCoords};
use crate::error::StoreError;
use crate::layout;
use crate::monitor::ConnectionMonitor;
use crate::retry::{with_retry, Classify, ErrorKind, RetryPolicy};
use crate::store::{Content, EncodedContent, EntryKind, RepoStore};

/// Attempts at finding a free `-N` suffix when an archive path is taken.
const MAX_PATH_SUFFIX: u32 = 100;

/// One archive document found by [`ArchiveService::list_archives`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub path: String,
}

/// Header fields of an archive plus the revision to send back on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableArchive {
    pub title: String,
    pub description: String,
    pub revision_id: String,
}

/// Where a newly created archive landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedArchive {
    pub path: String,
    pub url: String,
}

/// A stored archive document with its current revision.
#[derive(Debug, Clone)]
struct ArchiveDocument {
    text: String,
    revision_id: String,
}

pub struct ArchiveService {
    store: Arc<dyn RepoStore>,
    coords: RepoCoords,
    policy: RetryPolicy,
    monitor: Option<Arc<ConnectionMonitor>>,
}

impl ArchiveService {
    pub fn new(store: Arc<dyn RepoStore>, coords: RepoCoords) -> Self {
        Self {
            store,
            coords,
            policy: RetryPolicy::default(),
            monitor: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<ConnectionMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn coords(&self) -> &RepoCoords {
        &self.coords
    }

    /// Runs one remote call under the retry policy and reports connectivity.
    async fn call<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let result = with_retry(&self.policy, op).await;
        if let Some(monitor) = &self.monitor {
            match &result {
                Ok(_) => monitor.set_online(true),
                Err(e) if e.status().is_some() => monitor.set_online(true),
                Err(e @ StoreError::Transport(_))
                    if matches!(e.classify(), ErrorKind::Transport | ErrorKind::Timeout) =>
                {
                    monitor.set_online(false)
                }
                Err(_) => {}
            }
        }
        result
    }

    /// One unretried read of the archive document at `path`.
    async fn read_document(&self, path: &str) -> Result<ArchiveDocument, StoreError> {
        match self.store.get_content(path).await? {
            Content::File(file) => Ok(ArchiveDocument {
                text: String::from_utf8(file.bytes)?,
                revision_id: file.revision_id,
            }),
            Content::Directory(_) => Err(StoreError::InvalidPath(format!(
                "{} is a directory",
                path
            ))),
        }
    }

    async fn fetch_document(&self, path: &str) -> Result<ArchiveDocument, StoreError> {
        self.call(move || self.read_document(path)).await
    }

    /// First `diaries/YYYY/MM/DD-slug[-N].md` with nothing stored at it.
    async fn free_archive_path(&self, now: DateTime<Utc>, title: &str) -> Result<String, StoreError> {
        let base = layout::archive_path(now.with_timezone(&Local).date_naive(), title);
        let stem = base.trim_end_matches(layout::ARCHIVE_EXTENSION).to_string();
        let store = &self.store;
        let mut candidate = base.clone();
        for n in 2..=MAX_PATH_SUFFIX + 1 {
            let path = candidate.as_str();
            if self.call(move || store.lookup_revision(path)).await?.is_none() {
                return Ok(candidate);
            }
            tracing::debug!(path, "archive path taken");
            candidate = format!("{}-{}{}", stem, n, layout::ARCHIVE_EXTENSION);
        }
        Err(StoreError::InvalidInput(format!(
            "no free archive path for {:?} after {} attempts",
            base, MAX_PATH_SUFFIX
        )))
    }

    /// Writes a new archive document linking `links`.
    pub async fn create_archive(
        &self,
        title: &str,
        description: &str,
        links: &[FileLink],
    ) -> Result<CreatedArchive, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::InvalidInput("archive title is empty".into()));
        }
        if links.is_empty() {
            return Err(StoreError::InvalidInput("archive has no files".into()));
        }

        let now = Utc::now();
        let path = self.free_archive_path(now, title).await?;
        let text = codec::encode(&self.coords, title, description, now, links);
        let content = EncodedContent::encode(text.as_bytes());
        let message = format!("Create archive: {}", title);

        let store = &self.store;
        let retrying = &AtomicBool::new(false);
        let (p, c, m) = (path.as_str(), &content, message.as_str());
        let outcome = self
            .call(move || async move {
                // The path was free; on a retry an earlier write may have landed.
                let rev = if retrying.swap(true, Ordering::Relaxed) {
                    store.lookup_revision(p).await?
                } else {
                    None
                };
                store
                    .create_or_update(p, c, m, rev.as_ref().map(|r| r.revision_id.as_str()))
                    .await
            })
            .await?;
        tracing::info!(path = %path, files = links.len(), "created archive");
        let url = outcome
            .html_url
            .unwrap_or_else(|| self.coords.blob_url(&path));
        Ok(CreatedArchive { path, url })
    }

    /// Creates an archive from the tasks that uploaded successfully.
    pub async fn create_archive_from_tasks(
        &self,
        title: &str,
        description: &str,
        tasks: &[UploadTask],
    ) -> Result<CreatedArchive, StoreError> {
        let links: Vec<FileLink> = tasks.iter().filter_map(UploadTask::file_link).collect();
        if links.is_empty() {
            return Err(StoreError::InvalidInput(
                "no files were uploaded successfully".into(),
            ));
        }
        self.create_archive(title, description, &links).await
    }

    /// All archive documents under `diaries/`, newest path first.
    pub async fn list_archives(&self) -> Result<Vec<ArchiveEntry>, StoreError> {
        let store = &self.store;
        let mut pending = vec![layout::ROOT_DIR.to_string()];
        let mut archives = Vec::new();

        while let Some(dir) = pending.pop() {
            let d = dir.as_str();
            let entries = match self.call(move || store.get_content(d)).await {
                Ok(Content::Directory(entries)) => entries,
                Ok(Content::File(_)) => continue,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(dir = %dir, "directory missing; skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            for entry in entries {
                match entry.kind {
                    EntryKind::Dir => pending.push(entry.path),
                    EntryKind::File if layout::is_archive_document(&entry.name) => {
                        archives.push(ArchiveEntry {
                            name: entry.name,
                            path: entry.path,
                        })
                    }
                    EntryKind::File | EntryKind::Other => {}
                }
            }
        }

        archives.sort_by(|a, b| b.path.cmp(&a.path));
        Ok(archives)
    }

    /// Markdown text of the archive at `path`, for preview.
    pub async fn get_archive_content(&self, path: &str) -> Result<String, StoreError> {
        Ok(self.fetch_document(path).await?.text)
    }

    pub async fn get_archive_for_editing(&self, path: &str) -> Result<EditableArchive, StoreError> {
        let doc = self.fetch_document(path).await?;
        let ArchiveHeader { title, description } = codec::decode(&doc.text);
        Ok(EditableArchive {
            title,
            description,
            revision_id: doc.revision_id,
        })
    }

    /// Replaces the title and description of the archive at `path`.
    ///
    /// Every attempt re-reads the document so the write carries its current
    /// revision; file links and the archived-on line are kept as they are.
    pub async fn update_archive(
        &self,
        path: &str,
        new_title: &str,
        new_description: &str,
    ) -> Result<String, StoreError> {
        if new_title.trim().is_empty() {
            return Err(StoreError::InvalidInput("archive title is empty".into()));
        }
        let message = format!("Update archive: {}", new_title);

        let store = &self.store;
        let m = message.as_str();
        let outcome = self
            .call(move || async move {
                let doc = self.read_document(path).await?;
                let text = codec::reencode(&doc.text, new_title, new_description).map_err(
                    |e| match e {
                        CodecError::MissingSeparator => StoreError::CorruptArchive {
                            path: path.to_string(),
                            reason: e.to_string(),
                        },
                    },
                )?;
                let content = EncodedContent::encode(text.as_bytes());
                store
                    .create_or_update(path, &content, m, Some(doc.revision_id.as_str()))
                    .await
            })
            .await?;
        tracing::info!(path, revision = %outcome.revision_id, "updated archive");
        Ok(outcome
            .html_url
            .unwrap_or_else(|| self.coords.blob_url(path)))
    }

    /// Deletes the archive document at `path` (uploaded files stay).
    pub async fn delete_archive(&self, path: &str) -> Result<(), StoreError> {
        let doc = self.fetch_document(path).await?;
        let name = path.rsplit('/').next().unwrap_or(path);
        let message = format!("Delete archive: {}", name);

        let store = &self.store;
        let retrying = &AtomicBool::new(false);
        let (m, first_rev) = (message.as_str(), doc.revision_id.as_str());
        self.call(move || async move {
            if !retrying.swap(true, Ordering::Relaxed) {
                return store.delete_file(path, m, first_rev).await;
            }
            // Gone on a retry means an earlier attempt went through.
            match store.lookup_revision(path).await? {
                Some(current) => store.delete_file(path, m, &current.revision_id).await,
                None => Ok(()),
            }
        })
        .await?;
        tracing::info!(path, "deleted archive");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
