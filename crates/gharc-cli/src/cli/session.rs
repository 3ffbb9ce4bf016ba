//! Builds the archive service from config, flags and the saved token.

use anyhow::{Context, Result};
use gharc_core::config::GharcConfig;
use gharc_core::credential;
use gharc_core::monitor::ConnectionMonitor;
use gharc_core::retry::ErrorKind;
use gharc_core::store::GitHubStore;
use gharc_core::ArchiveService;
use std::sync::Arc;
use std::time::Duration;

/// Repository flags given on the command line.
#[derive(Debug, Default, Clone)]
pub struct RepoOverrides {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
}

impl RepoOverrides {
    pub fn apply(&self, cfg: &mut GharcConfig) {
        if let Some(owner) = &self.owner {
            cfg.owner = owner.clone();
        }
        if let Some(repo) = &self.repo {
            cfg.repo = repo.clone();
        }
        if let Some(branch) = &self.branch {
            cfg.branch = branch.clone();
        }
    }
}

pub fn open_service(mut cfg: GharcConfig, overrides: &RepoOverrides) -> Result<ArchiveService> {
    overrides.apply(&mut cfg);
    let coords = cfg.coords()?;
    let token = credential::resolve_token()?.with_context(|| {
        format!(
            "no GitHub token: run `gharc login` or set {}",
            credential::TOKEN_ENV
        )
    })?;

    let mut store = GitHubStore::new(&cfg.api_base, coords.clone(), token)?;
    if let Some(agent) = &cfg.user_agent {
        store = store.with_user_agent(agent.clone());
    }
    if let Some(secs) = cfg.timeout_secs {
        store = store.with_timeout(Duration::from_secs(secs));
    }

    let policy = cfg.retry_policy().with_on_retry(|attempt, kind, err| {
        let reason = match kind {
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::Timeout => "timed out",
            ErrorKind::Server(_) => "server error",
            _ => "network error",
        };
        eprintln!("attempt {} failed, {} ({}); retrying", attempt, reason, err);
    });

    let monitor = Arc::new(ConnectionMonitor::default());
    monitor.add_listener(|online| {
        if online {
            eprintln!("connection restored");
        } else {
            eprintln!("GitHub is unreachable; check your network connection");
        }
    });

    Ok(ArchiveService::new(Arc::new(store), coords)
        .with_retry_policy(policy)
        .with_monitor(monitor))
}
