//! In-process [`RepoStore`] with GitHub-like revision checks.
//!
//! Used by tests and dry runs. Errors can be queued with [`MemoryStore::fail_next`]
//! to exercise retry paths; each call consumes at most one queued error.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::store::{
    Content, DirEntry, EncodedContent, EntryKind, RepoStore, StoredFile, WriteOutcome,
};

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, StoredFile>,
    next_revision: u64,
    faults: VecDeque<StoreError>,
    calls: usize,
}

impl Inner {
    fn next_revision(&mut self) -> String {
        self.next_revision += 1;
        format!("rev{}", self.next_revision)
    }

    /// Counts the call and hands back the next injected failure, if any.
    fn begin_call(&mut self) -> Result<(), StoreError> {
        self.calls += 1;
        match self.faults.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `bytes` at `path` directly, returning the new revision.
    pub fn insert(&self, path: &str, bytes: impl Into<Vec<u8>>) -> String {
        let mut inner = self.lock();
        let revision_id = inner.next_revision();
        inner.files.insert(
            path.to_string(),
            StoredFile {
                path: path.to_string(),
                revision_id: revision_id.clone(),
                bytes: bytes.into(),
            },
        );
        revision_id
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).map(|f| f.bytes.clone())
    }

    pub fn revision(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).map(|f| f.revision_id.clone())
    }

    /// All file paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Makes the next call fail with `error` (queued behind earlier faults).
    pub fn fail_next(&self, error: StoreError) {
        self.lock().faults.push_back(error);
    }

    /// Number of trait calls served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    fn list_dir(inner: &Inner, dir: &str) -> Vec<DirEntry> {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for path in inner.files.keys() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((sub, _)) => {
                    dirs.insert(sub.to_string());
                }
                None => entries.push(DirEntry {
                    name: rest.to_string(),
                    path: path.clone(),
                    kind: EntryKind::File,
                }),
            }
        }
        entries.extend(dirs.into_iter().map(|name| DirEntry {
            path: format!("{}{}", prefix, name),
            name,
            kind: EntryKind::Dir,
        }));
        entries
    }
}

fn not_found(path: &str) -> StoreError {
    StoreError::from_status(404, format!("{}: Not Found", path))
}

#[async_trait]
impl RepoStore for MemoryStore {
    async fn get_content(&self, path: &str) -> Result<Content, StoreError> {
        let mut inner = self.lock();
        inner.begin_call()?;
        let path = path.trim_matches('/');
        if let Some(file) = inner.files.get(path) {
            return Ok(Content::File(file.clone()));
        }
        let entries = Self::list_dir(&inner, path);
        if entries.is_empty() {
            return Err(not_found(path));
        }
        Ok(Content::Directory(entries))
    }

    async fn create_or_update(
        &self,
        path: &str,
        content: &EncodedContent,
        _message: &str,
        revision_id: Option<&str>,
    ) -> Result<WriteOutcome, StoreError> {
        let bytes = content.decode()?;
        let mut inner = self.lock();
        inner.begin_call()?;
        match (inner.files.get(path), revision_id) {
            (Some(_), None) => {
                return Err(StoreError::from_status(
                    422,
                    format!("{}: \"sha\" wasn't supplied", path),
                ))
            }
            (Some(existing), Some(rev)) if existing.revision_id != rev => {
                return Err(StoreError::from_status(
                    409,
                    format!("{}: does not match {}", path, rev),
                ))
            }
            _ => {}
        }
        let revision_id = inner.next_revision();
        inner.files.insert(
            path.to_string(),
            StoredFile {
                path: path.to_string(),
                revision_id: revision_id.clone(),
                bytes,
            },
        );
        Ok(WriteOutcome {
            html_url: None,
            revision_id,
        })
    }

    async fn delete_file(
        &self,
        path: &str,
        _message: &str,
        revision_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.begin_call()?;
        match inner.files.get(path) {
            None => Err(not_found(path)),
            Some(existing) if existing.revision_id != revision_id => Err(StoreError::from_status(
                409,
                format!("{}: does not match {}", path, revision_id),
            )),
            Some(_) => {
                inner.files.remove(path);
                Ok(())
            }
        }
    }
}
