//! Personal access token storage.
//!
//! The token lives in `~/.config/gharc/token`, readable by the owner only.
//! `GITHUB_TOKEN` in the environment takes precedence over the file.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable checked before the token file.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

pub fn token_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("gharc")?;
    Ok(xdg_dirs.place_config_file("token")?)
}

/// Writes `token` to `path`, replacing any previous token.
pub fn save_token_at(path: &Path, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("token is empty");
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    #[cfg(unix)]
    {
        // mode() only applies on creation.
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    writeln!(file, "{}", token)?;
    tracing::info!("saved token to {}", path.display());
    Ok(())
}

/// Reads the token stored at `path`; `None` if the file is missing or blank.
pub fn load_token_at(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(data) => {
            let token = data.trim();
            Ok((!token.is_empty()).then(|| token.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Picks the environment token if set, else the file token.
pub fn resolve_token_with(env_value: Option<String>, path: &Path) -> Result<Option<String>> {
    if let Some(token) = env_value.map(|t| t.trim().to_string()) {
        if !token.is_empty() {
            tracing::debug!("using token from {}", TOKEN_ENV);
            return Ok(Some(token));
        }
    }
    load_token_at(path)
}

/// Token from `GITHUB_TOKEN` or the token file.
pub fn resolve_token() -> Result<Option<String>> {
    resolve_token_with(std::env::var(TOKEN_ENV).ok(), &token_path()?)
}
