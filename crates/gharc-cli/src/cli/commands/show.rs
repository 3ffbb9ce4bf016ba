//! `gharc show <path>` – print an archive's markdown.

use anyhow::Result;
use gharc_core::ArchiveService;

pub async fn run_show(service: &ArchiveService, path: &str) -> Result<()> {
    let text = service.get_archive_content(path).await?;
    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}
