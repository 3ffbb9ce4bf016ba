//! `gharc delete <path>` – delete an archive document.

use anyhow::Result;
use gharc_core::ArchiveService;

use super::prompt;

pub async fn run_delete(service: &ArchiveService, path: &str, yes: bool) -> Result<()> {
    if !yes && !prompt::is_yes(&prompt::read_line(&format!("Delete {}? [y/N] ", path))?) {
        println!("Aborted.");
        return Ok(());
    }
    service.delete_archive(path).await?;
    println!("Deleted {}", path);
    Ok(())
}
