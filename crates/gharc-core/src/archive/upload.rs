//! File uploads: single files and concurrent batches.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Mutex;

use super::ArchiveService;
use crate::codec::FileLink;
use crate::error::StoreError;
use crate::layout::{self, MediaKind};
use crate::store::EncodedContent;

/// A file picked for upload and its progress through [`ArchiveService::upload_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub display_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    /// 0..=100.
    pub progress: u8,
    /// Set once the file is stored.
    pub stored_path: Option<String>,
    /// Set when the last attempt failed.
    pub error_message: Option<String>,
}

impl UploadTask {
    pub fn new(display_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            display_name: display_name.into(),
            mime: mime.into(),
            bytes,
            progress: 0,
            stored_path: None,
            error_message: None,
        }
    }

    /// Task whose MIME type is sniffed from the content, or guessed from the
    /// name when the content is not recognized.
    pub fn from_bytes(display_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let display_name = display_name.into();
        let mime = layout::detect_mime(&display_name, &bytes);
        Self::new(display_name, mime, bytes)
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime)
    }

    /// Link for the archive document, once uploaded.
    pub fn file_link(&self) -> Option<FileLink> {
        self.stored_path.as_ref().map(|path| FileLink {
            display_name: self.display_name.clone(),
            stored_path: path.clone(),
            kind: self.kind(),
        })
    }
}

impl ArchiveService {
    /// Stores one file under its kind subdirectory with a fresh unique name.
    ///
    /// `on_progress` sees 10, 50, 70, 90 and 100 as the upload advances, each
    /// at most once. The existence lookup and the write are retried together,
    /// so a write whose response was lost is retried against the revision it
    /// left behind.
    pub async fn upload_file<P>(
        &self,
        display_name: &str,
        mime: &str,
        bytes: &[u8],
        on_progress: P,
    ) -> Result<FileLink, StoreError>
    where
        P: FnMut(u8),
    {
        let progress = Mutex::new((0u8, on_progress));
        let report = |value: u8| {
            if let Ok(mut guard) = progress.lock() {
                let (last, callback) = &mut *guard;
                if value > *last {
                    *last = value;
                    callback(value);
                }
            }
        };

        report(10);
        let kind = MediaKind::from_mime(mime);
        let path = layout::upload_path(kind, &layout::unique_file_name(display_name, Utc::now()));
        let content = EncodedContent::encode(bytes);
        report(50);

        let store = &self.store;
        let message = format!("Add file: {}", display_name);
        let (p, c, m, report) = (path.as_str(), &content, message.as_str(), &report);
        self.call(move || async move {
            let existing = store.lookup_revision(p).await?;
            if existing.is_some() {
                tracing::debug!(path = p, "upload path already exists; replacing it");
            }
            report(70);
            let rev = existing.as_ref().map(|e| e.revision_id.as_str());
            store.create_or_update(p, c, m, rev).await
        })
        .await?;
        report(90);

        tracing::info!(path = %path, bytes = bytes.len(), mime, "uploaded file");
        report(100);
        Ok(FileLink {
            display_name: display_name.to_string(),
            stored_path: path,
            kind,
        })
    }

    /// Uploads every pending task concurrently; returns how many succeeded.
    ///
    /// Tasks that already carry a `stored_path` are left alone, so a batch can
    /// be re-run to retry only the failures.
    pub async fn upload_batch(&self, tasks: &mut [UploadTask]) -> usize {
        let uploads = tasks
            .iter_mut()
            .filter(|task| task.stored_path.is_none())
            .map(|task| async move {
                task.error_message = None;
                task.progress = 0;
                let result = self
                    .upload_file(&task.display_name, &task.mime, &task.bytes, |p| {
                        task.progress = p
                    })
                    .await;
                match result {
                    Ok(link) => {
                        task.stored_path = Some(link.stored_path);
                        true
                    }
                    Err(e) => {
                        tracing::warn!(file = %task.display_name, error = %e, "upload failed");
                        task.error_message = Some(e.to_string());
                        false
                    }
                }
            });
        join_all(uploads).await.into_iter().filter(|ok| *ok).count()
    }
}
