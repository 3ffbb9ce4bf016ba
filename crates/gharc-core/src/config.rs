use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::RepoCoords;
use crate::retry::{Backoff, RetryPolicy};
use crate::store::DEFAULT_API_BASE;

/// Upper bound for `base_delay_secs` (one hour).
pub const MAX_BASE_DELAY_SECS: f64 = 3600.0;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per remote call (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// "exponential" (default) or "linear".
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryConfig {
    /// Negative or non-finite delays are treated as zero; the rest is capped
    /// at [`MAX_BASE_DELAY_SECS`].
    pub fn to_policy(&self) -> RetryPolicy {
        let secs = if self.base_delay_secs.is_finite() {
            self.base_delay_secs.clamp(0.0, MAX_BASE_DELAY_SECS)
        } else {
            0.0
        };
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs_f64(secs),
            self.backoff,
        )
    }
}

/// Global configuration loaded from `~/.config/gharc/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GharcConfig {
    /// Repository owner (user or organization). Empty until configured.
    pub owner: String,
    /// Repository that stores uploads and archives.
    pub repo: String,
    /// Branch every read and write targets.
    pub branch: String,
    /// REST API root; change for GitHub Enterprise.
    pub api_base: String,
    /// Optional User-Agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Optional per-request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for GharcConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: "main".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: None,
            timeout_secs: None,
            retry: None,
        }
    }
}

impl GharcConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    /// Repository coordinates; fails if owner or repo is still unset.
    pub fn coords(&self) -> Result<RepoCoords> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            anyhow::bail!(
                "repository not configured: set `owner` and `repo` in {} or pass --owner/--repo",
                config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "config.toml".to_string())
            );
        }
        Ok(RepoCoords::new(
            self.owner.trim(),
            self.repo.trim(),
            self.branch.trim(),
        ))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("gharc")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GharcConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<GharcConfig> {
    if !path.exists() {
        let default_cfg = GharcConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: GharcConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}
