use super::*;
use crate::codec::ArchiveHeader;
use crate::layout::MediaKind;
use crate::retry::Backoff;
use crate::store::{MemoryStore, WriteOutcome};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

fn coords() -> RepoCoords {
    RepoCoords::new("alice", "archive-store", "main")
}

fn service(store: &Arc<MemoryStore>) -> ArchiveService {
    ArchiveService::new(store.clone(), coords())
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10), Backoff::Linear))
}

fn image_link(name: &str) -> FileLink {
    FileLink {
        display_name: name.to_string(),
        stored_path: format!("diaries/images/1_abc123_{}", name),
        kind: MediaKind::Image,
    }
}

fn text_of(store: &MemoryStore, path: &str) -> String {
    String::from_utf8(store.get(path).expect("stored")).unwrap()
}

/// Applies writes and deletes, then answers the next `dropped` of them with a
/// 502 as if the response had been lost on the way back.
struct LostResponses {
    inner: Arc<MemoryStore>,
    dropped: Mutex<u32>,
}

impl LostResponses {
    fn new(inner: &Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::clone(inner),
            dropped: Mutex::new(0),
        })
    }

    fn drop_next(&self, n: u32) {
        *self.dropped.lock().unwrap() = n;
    }

    fn take_drop(&self) -> bool {
        let mut left = self.dropped.lock().unwrap();
        if *left == 0 {
            return false;
        }
        *left -= 1;
        true
    }
}

#[async_trait]
impl RepoStore for LostResponses {
    async fn get_content(&self, path: &str) -> Result<Content, StoreError> {
        self.inner.get_content(path).await
    }

    async fn create_or_update(
        &self,
        path: &str,
        content: &EncodedContent,
        message: &str,
        revision_id: Option<&str>,
    ) -> Result<WriteOutcome, StoreError> {
        let outcome = self
            .inner
            .create_or_update(path, content, message, revision_id)
            .await?;
        if self.take_drop() {
            return Err(StoreError::from_status(502, "Bad Gateway"));
        }
        Ok(outcome)
    }

    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        revision_id: &str,
    ) -> Result<(), StoreError> {
        self.inner.delete_file(path, message, revision_id).await?;
        if self.take_drop() {
            return Err(StoreError::from_status(502, "Bad Gateway"));
        }
        Ok(())
    }
}

fn lossy_service(store: &Arc<LostResponses>) -> ArchiveService {
    ArchiveService::new(store.clone(), coords())
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10), Backoff::Linear))
}

#[tokio::test]
async fn upload_file_reports_progress_and_stores_bytes() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    let mut seen = Vec::new();

    let link = svc
        .upload_file("My Photo.PNG", "image/png", b"\x89PNG", |p| seen.push(p))
        .await
        .unwrap();

    assert_eq!(seen, vec![10, 50, 70, 90, 100]);
    assert_eq!(link.kind, MediaKind::Image);
    assert_eq!(link.display_name, "My Photo.PNG");
    assert!(link.stored_path.starts_with("diaries/images/"));
    assert!(link.stored_path.ends_with("_My_Photo.PNG"));
    assert_eq!(store.get(&link.stored_path).unwrap(), b"\x89PNG");
}

#[tokio::test]
async fn upload_file_picks_subdirectory_by_mime() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    for (mime, dir) in [
        ("video/mp4", "diaries/videos/"),
        ("audio/mpeg", "diaries/audios/"),
        ("application/pdf", "diaries/pdfs/"),
        ("text/plain", "diaries/attachments/"),
    ] {
        let link = svc.upload_file("f", mime, b"x", |_| {}).await.unwrap();
        assert!(link.stored_path.starts_with(dir), "{} -> {}", mime, link.stored_path);
    }
}

#[tokio::test]
async fn upload_aborts_when_existence_check_fails() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    store.fail_next(StoreError::from_status(401, "Bad credentials"));
    let mut seen = Vec::new();

    let err = svc
        .upload_file("a.png", "image/png", b"x", |p| seen.push(p))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Authentication(_)));
    assert_eq!(seen, vec![10, 50]);
    assert!(store.paths().is_empty());
    assert_eq!(store.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn upload_retries_transient_failures() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    store.fail_next(StoreError::from_status(503, "unavailable"));
    store.fail_next(StoreError::from_status(502, "bad gateway"));

    let link = svc.upload_file("a.png", "image/png", b"x", |_| {}).await.unwrap();

    assert!(store.get(&link.stored_path).is_some());
    // Two failed lookups, one successful lookup, one write.
    assert_eq!(store.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn upload_recovers_when_write_response_is_lost() {
    let memory = Arc::new(MemoryStore::new());
    let store = LostResponses::new(&memory);
    let svc = lossy_service(&store);
    store.drop_next(1);
    let mut seen = Vec::new();

    let link = svc
        .upload_file("a.png", "image/png", b"pixels", |p| seen.push(p))
        .await
        .unwrap();

    assert_eq!(seen, vec![10, 50, 70, 90, 100]);
    assert_eq!(memory.paths(), vec![link.stored_path.clone()]);
    assert_eq!(memory.get(&link.stored_path).unwrap(), b"pixels");
    // lookup, write (lost), lookup, write
    assert_eq!(memory.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn batch_rerun_does_not_duplicate_after_lost_response() {
    let memory = Arc::new(MemoryStore::new());
    let store = LostResponses::new(&memory);
    let svc = lossy_service(&store);
    let mut tasks = vec![UploadTask::new("a.png", "image/png", b"a".to_vec())];
    store.drop_next(1);

    assert_eq!(svc.upload_batch(&mut tasks).await, 1);
    assert!(tasks[0].error_message.is_none());
    assert_eq!(svc.upload_batch(&mut tasks).await, 0);
    assert_eq!(memory.paths().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn create_archive_recovers_when_write_response_is_lost() {
    let memory = Arc::new(MemoryStore::new());
    let store = LostResponses::new(&memory);
    let svc = lossy_service(&store);
    store.drop_next(1);

    let created = svc
        .create_archive("Trip", "Sunny", &[image_link("a.png")])
        .await
        .unwrap();

    assert!(created.path.ends_with("-trip.md"), "{}", created.path);
    assert_eq!(memory.paths(), vec![created.path.clone()]);
    assert_eq!(codec::decode(&text_of(&memory, &created.path)).title, "Trip");
}

#[tokio::test(start_paused = true)]
async fn update_archive_recovers_when_write_response_is_lost() {
    let memory = Arc::new(MemoryStore::new());
    let store = LostResponses::new(&memory);
    let svc = lossy_service(&store);
    let created = svc
        .create_archive("Trip", "old", &[image_link("a.png")])
        .await
        .unwrap();
    store.drop_next(1);

    svc.update_archive(&created.path, "Trip", "new")
        .await
        .unwrap();

    let text = text_of(&memory, &created.path);
    assert_eq!(codec::decode(&text).description, "new");
    assert!(text.contains("## a.png"));
}

#[tokio::test(start_paused = true)]
async fn delete_archive_recovers_when_response_is_lost() {
    let memory = Arc::new(MemoryStore::new());
    memory.insert("diaries/2024/01/05-a.md", "# a");
    let store = LostResponses::new(&memory);
    let svc = lossy_service(&store);
    store.drop_next(1);

    svc.delete_archive("diaries/2024/01/05-a.md").await.unwrap();
    assert!(memory.paths().is_empty());
}

#[tokio::test]
async fn batch_isolates_failures_and_can_be_rerun() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    let mut tasks = vec![
        UploadTask::new("a.png", "image/png", b"a".to_vec()),
        UploadTask::new("b.pdf", "application/pdf", b"b".to_vec()),
    ];
    store.fail_next(StoreError::from_status(401, "Bad credentials"));

    assert_eq!(svc.upload_batch(&mut tasks).await, 1);
    let failed: Vec<&UploadTask> = tasks.iter().filter(|t| t.stored_path.is_none()).collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error_message.as_deref().unwrap().contains("Bad credentials"));
    let done = tasks.iter().find(|t| t.stored_path.is_some()).unwrap();
    assert_eq!(done.progress, 100);
    assert!(done.error_message.is_none());

    assert_eq!(svc.upload_batch(&mut tasks).await, 1);
    assert!(tasks.iter().all(|t| t.stored_path.is_some() && t.error_message.is_none()));
    assert_eq!(store.paths().len(), 2);
}

#[test]
fn upload_task_guesses_svg_from_name() {
    let task = UploadTask::from_bytes("logo.svg", b"<svg></svg>".to_vec());
    assert_eq!(task.mime, "image/svg+xml");
    assert_eq!(task.kind(), MediaKind::Image);
}

#[test]
fn upload_task_sniffs_mime_and_links_once_stored() {
    let mut task = UploadTask::from_bytes("scan", b"%PDF-1.7\n".to_vec());
    assert_eq!(task.mime, "application/pdf");
    assert_eq!(task.kind(), MediaKind::Pdf);
    assert!(task.file_link().is_none());

    task.stored_path = Some("diaries/pdfs/1_abc123_scan".into());
    let link = task.file_link().unwrap();
    assert_eq!(link.stored_path, "diaries/pdfs/1_abc123_scan");
    assert_eq!(link.kind, MediaKind::Pdf);
}

#[tokio::test]
async fn create_archive_writes_dated_document() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);

    let created = svc
        .create_archive("Beach Trip", "Sunny", &[image_link("a.png")])
        .await
        .unwrap();

    let parts: Vec<&str> = created.path.split('/').collect();
    assert_eq!(parts.len(), 4, "{}", created.path);
    assert_eq!(parts[0], "diaries");
    assert_eq!(parts[1].len(), 4);
    assert_eq!(parts[2].len(), 2);
    assert!(parts[3].ends_with("-beach-trip.md"));
    assert_eq!(
        created.url,
        format!("https://github.com/alice/archive-store/blob/main/{}", created.path)
    );

    let text = text_of(&store, &created.path);
    assert_eq!(
        codec::decode(&text),
        ArchiveHeader {
            title: "Beach Trip".into(),
            description: "Sunny".into(),
        }
    );
    assert!(text.contains("![a.png](https://raw.githubusercontent.com/alice/archive-store/main/diaries/images/1_abc123_a.png)"));
}

#[tokio::test]
async fn same_day_same_title_gets_suffix() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    let links = [image_link("a.png")];

    let first = svc.create_archive("Trip", "", &links).await.unwrap();
    let second = svc.create_archive("Trip", "", &links).await.unwrap();
    let third = svc.create_archive("Trip", "", &links).await.unwrap();

    assert!(first.path.ends_with("-trip.md"));
    assert_eq!(second.path, first.path.replace("-trip.md", "-trip-2.md"));
    assert_eq!(third.path, first.path.replace("-trip.md", "-trip-3.md"));
}

#[tokio::test]
async fn create_archive_validates_input() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    assert!(matches!(
        svc.create_archive("  ", "", &[image_link("a.png")]).await,
        Err(StoreError::InvalidInput(_))
    ));
    assert!(matches!(
        svc.create_archive("Trip", "", &[]).await,
        Err(StoreError::InvalidInput(_))
    ));
    let tasks = [UploadTask::new("a.png", "image/png", vec![1])];
    assert!(matches!(
        svc.create_archive_from_tasks("Trip", "", &tasks).await,
        Err(StoreError::InvalidInput(_))
    ));
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn create_archive_from_tasks_links_only_uploaded_files() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    let mut ok = UploadTask::new("a.png", "image/png", vec![1]);
    ok.stored_path = Some("diaries/images/1_abc123_a.png".into());
    let mut failed = UploadTask::new("b.mp4", "video/mp4", vec![2]);
    failed.error_message = Some("boom".into());

    let created = svc
        .create_archive_from_tasks("Trip", "", &[ok, failed])
        .await
        .unwrap();

    let text = text_of(&store, &created.path);
    assert!(text.contains("## a.png"));
    assert!(!text.contains("b.mp4"));
}

#[tokio::test]
async fn list_archives_newest_path_first() {
    let store = Arc::new(MemoryStore::new());
    store.insert("diaries/2024/01/05-a.md", "# a");
    store.insert("diaries/2023/12/31-b.md", "# b");
    store.insert("diaries/2024/02/10-c.md", "# c");
    store.insert("diaries/images/1_abc123_x.png", vec![0u8]);
    store.insert("diaries/2024/01/notes.txt", "not an archive");
    let svc = service(&store);

    let listed = svc.list_archives().await.unwrap();
    let paths: Vec<&str> = listed.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "diaries/2024/02/10-c.md",
            "diaries/2024/01/05-a.md",
            "diaries/2023/12/31-b.md",
        ]
    );
    assert_eq!(listed[0].name, "10-c.md");
}

#[tokio::test]
async fn list_archives_of_empty_repository_is_empty() {
    let store = Arc::new(MemoryStore::new());
    assert!(service(&store).list_archives().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_archives_propagates_fatal_errors() {
    let store = Arc::new(MemoryStore::new());
    store.insert("diaries/2024/01/05-a.md", "# a");
    store.fail_next(StoreError::from_status(401, "Bad credentials"));
    let err = service(&store).list_archives().await.unwrap_err();
    assert!(matches!(err, StoreError::Authentication(_)));
}

#[tokio::test]
async fn edit_roundtrip_keeps_files_section() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(&store);
    let created = svc
        .create_archive("Trip", "old words", &[image_link("a.png")])
        .await
        .unwrap();
    let before = text_of(&store, &created.path);

    let editable = svc.get_archive_for_editing(&created.path).await.unwrap();
    assert_eq!(editable.title, "Trip");
    assert_eq!(editable.description, "old words");
    assert_eq!(Some(editable.revision_id.clone()), store.revision(&created.path));

    svc.update_archive(&created.path, "Road Trip", "new\nwords")
        .await
        .unwrap();
    let after = text_of(&store, &created.path);
    assert_eq!(
        codec::decode(&after),
        ArchiveHeader {
            title: "Road Trip".into(),
            description: "new\nwords".into(),
        }
    );
    let tail = |t: &str| t[t.find(codec::ARCHIVED_ON_MARKER).unwrap()..].to_string();
    assert_eq!(tail(&before), tail(&after));
    assert_ne!(Some(editable.revision_id), store.revision(&created.path));
}

#[tokio::test]
async fn update_refuses_document_without_separator() {
    let store = Arc::new(MemoryStore::new());
    let path = "diaries/2024/01/05-broken.md";
    let rev = store.insert(path, "# Broken\n\nno rule here\n");
    let svc = service(&store);

    let err = svc.update_archive(path, "Fixed", "").await.unwrap_err();
    match err {
        StoreError::CorruptArchive { path: p, .. } => assert_eq!(p, path),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(store.revision(path), Some(rev));
    assert_eq!(text_of(&store, path), "# Broken\n\nno rule here\n");
}

#[tokio::test]
async fn get_archive_content_returns_markdown() {
    let store = Arc::new(MemoryStore::new());
    store.insert("diaries/2024/01/05-a.md", "# a\n");
    let svc = service(&store);
    assert_eq!(
        svc.get_archive_content("diaries/2024/01/05-a.md").await.unwrap(),
        "# a\n"
    );
    assert!(svc
        .get_archive_content("diaries/2024/01/06-z.md")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn delete_archive_leaves_uploads() {
    let store = Arc::new(MemoryStore::new());
    store.insert("diaries/2024/01/05-a.md", "# a");
    store.insert("diaries/images/1_abc123_x.png", vec![0u8]);
    let svc = service(&store);

    svc.delete_archive("diaries/2024/01/05-a.md").await.unwrap();
    assert_eq!(store.paths(), vec!["diaries/images/1_abc123_x.png".to_string()]);

    assert!(matches!(
        svc.delete_archive("diaries/images").await,
        Err(StoreError::InvalidPath(_))
    ));
    assert!(svc
        .delete_archive("diaries/2024/01/05-a.md")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn monitor_tracks_transport_failures() {
    let store = Arc::new(MemoryStore::new());
    store.insert("diaries/2024/01/05-a.md", "# a");
    let monitor = Arc::new(ConnectionMonitor::new(true));
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    monitor.add_listener(move |online| sink.lock().unwrap().push(online));
    let svc = ArchiveService::new(store.clone(), coords())
        .with_retry_policy(RetryPolicy::new(1, Duration::ZERO, Backoff::Linear))
        .with_monitor(Arc::clone(&monitor));

    // CURLE_COULDNT_CONNECT
    store.fail_next(StoreError::Transport(curl::Error::new(7)));
    assert!(svc.list_archives().await.is_err());
    assert!(!monitor.is_online());

    // Any answer from the remote, even an error status, means we are online.
    store.fail_next(StoreError::from_status(404, "gone"));
    assert!(svc.get_archive_content("x.md").await.is_err());
    assert!(monitor.is_online());

    // CURLE_OPERATION_TIMEDOUT
    store.fail_next(StoreError::Transport(curl::Error::new(28)));
    assert!(svc.get_archive_content("x.md").await.is_err());
    assert!(!monitor.is_online());

    // A 408 is still an answer.
    store.fail_next(StoreError::from_status(408, "slow"));
    assert!(svc.get_archive_content("x.md").await.is_err());
    assert!(monitor.is_online());

    assert_eq!(*changes.lock().unwrap(), vec![false, true, false, true]);
}
