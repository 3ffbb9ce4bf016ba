//! `gharc list` – list archives, newest first.

use anyhow::Result;
use gharc_core::ArchiveService;

pub async fn run_list(service: &ArchiveService) -> Result<()> {
    let archives = service.list_archives().await?;
    if archives.is_empty() {
        println!("No archives yet.");
        return Ok(());
    }
    println!("{:<28} {}", "NAME", "PATH");
    for a in archives {
        println!("{:<28} {}", a.name, a.path);
    }
    Ok(())
}
