//! `gharc login` – store a personal access token.

use anyhow::Result;
use gharc_core::credential;

use super::prompt;

pub fn run_login(token: Option<String>) -> Result<()> {
    let token = match token {
        Some(t) => t,
        None => prompt::read_line("GitHub token: ")?,
    };
    let path = credential::token_path()?;
    credential::save_token_at(&path, &token)?;
    println!("Token saved to {}", path.display());
    Ok(())
}
