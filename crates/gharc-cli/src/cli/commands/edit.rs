//! `gharc edit <path>` – rewrite an archive's title and description.

use anyhow::Result;
use gharc_core::ArchiveService;

pub async fn run_edit(
    service: &ArchiveService,
    path: &str,
    title: Option<String>,
    description: Option<String>,
) -> Result<()> {
    let current = service.get_archive_for_editing(path).await?;
    if title.is_none() && description.is_none() {
        println!("Title: {}", current.title);
        println!("Description:\n{}", current.description);
        return Ok(());
    }

    let title = title.unwrap_or(current.title);
    let description = description.unwrap_or(current.description);
    let url = service.update_archive(path, &title, &description).await?;
    println!("Updated {}", url);
    Ok(())
}
