//! `gharc upload <files>... --title <title>` – upload files and create an archive.

use anyhow::{Context, Result};
use gharc_core::{ArchiveService, UploadTask};
use std::path::{Path, PathBuf};

/// Name shown in the archive: the file name, or the whole path if it has none.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub async fn run_upload(
    service: &ArchiveService,
    files: &[PathBuf],
    title: &str,
    description: &str,
) -> Result<()> {
    if title.trim().is_empty() {
        anyhow::bail!("archive title must not be empty");
    }

    let mut tasks = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        tasks.push(UploadTask::from_bytes(display_name(path), bytes));
    }

    let uploaded = service.upload_batch(&mut tasks).await;
    for task in &tasks {
        match (&task.stored_path, &task.error_message) {
            (Some(stored), _) => println!("  ok    {} -> {}", task.display_name, stored),
            (None, Some(err)) => println!("  FAIL  {}: {}", task.display_name, err),
            (None, None) => println!("  ??    {}", task.display_name),
        }
    }
    if uploaded == 0 {
        anyhow::bail!("no file was uploaded; archive not created");
    }
    if uploaded < tasks.len() {
        tracing::warn!(
            uploaded,
            total = tasks.len(),
            "creating archive without the failed files"
        );
    }

    let created = service
        .create_archive_from_tasks(title, description, &tasks)
        .await?;
    println!("Created archive {}", created.path);
    println!("{}", created.url);
    Ok(())
}
