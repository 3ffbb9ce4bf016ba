//! CLI for gharc.

mod commands;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use gharc_core::config;
use std::path::PathBuf;

use commands::{
    run_completions, run_delete, run_edit, run_list, run_login, run_show, run_upload,
};
use session::RepoOverrides;

/// Top-level CLI for gharc.
#[derive(Debug, Parser)]
#[command(name = "gharc", version)]
#[command(about = "gharc: keep dated media archives in a GitHub repository", long_about = None)]
pub struct Cli {
    /// Repository owner (overrides config.toml).
    #[arg(long, global = true, value_name = "OWNER")]
    pub owner: Option<String>,

    /// Repository name (overrides config.toml).
    #[arg(long, global = true, value_name = "REPO")]
    pub repo: Option<String>,

    /// Branch to read and write (overrides config.toml).
    #[arg(long, global = true, value_name = "BRANCH")]
    pub branch: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Save a GitHub personal access token for later commands.
    Login {
        /// Token value; read from stdin when omitted.
        #[arg(long)]
        token: Option<String>,
    },

    /// Upload files and create an archive linking them.
    Upload {
        /// Files to upload.
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Archive title.
        #[arg(long, short)]
        title: String,

        /// Archive description (markdown).
        #[arg(long, short, default_value = "")]
        description: String,
    },

    /// List archives, newest first.
    List,

    /// Print an archive's markdown.
    Show {
        /// Repository path, e.g. diaries/2024/01/05-trip.md.
        path: String,
    },

    /// Change an archive's title and/or description; prints them if neither is given.
    Edit {
        /// Repository path of the archive.
        path: String,

        /// New title.
        #[arg(long, short)]
        title: Option<String>,

        /// New description.
        #[arg(long, short)]
        description: Option<String>,
    },

    /// Delete an archive document (uploaded files are kept).
    Delete {
        /// Repository path of the archive.
        path: String,

        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let Cli {
            owner,
            repo,
            branch,
            command,
        } = Cli::parse();
        let overrides = RepoOverrides {
            owner,
            repo,
            branch,
        };

        // These two never touch the repository.
        match command {
            CliCommand::Login { token } => return run_login(token),
            CliCommand::Completions { shell } => {
                run_completions(shell);
                return Ok(());
            }
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let service = session::open_service(cfg, &overrides)?;

        match command {
            CliCommand::Upload {
                files,
                title,
                description,
            } => run_upload(&service, &files, &title, &description).await?,
            CliCommand::List => run_list(&service).await?,
            CliCommand::Show { path } => run_show(&service, &path).await?,
            CliCommand::Edit {
                path,
                title,
                description,
            } => run_edit(&service, &path, title, description).await?,
            CliCommand::Delete { path, yes } => run_delete(&service, &path, yes).await?,
            CliCommand::Login { .. } | CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
