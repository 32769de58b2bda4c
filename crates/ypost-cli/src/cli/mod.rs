//! CLI for the ypost Usenet poster.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use ypost_core::config::{self, PosterConfig, SubjectMode};

use commands::{run_post, run_show_config};

/// Top-level CLI for ypost.
#[derive(Debug, Parser)]
#[command(name = "ypost", version)]
#[command(about = "ypost: post files to Usenet as yEnc-encoded articles", long_about = None)]
pub struct Cli {
    /// Debug-level logging for ypost.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of ~/.config/ypost/config.toml.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Post files or directory trees to every configured server.
    Post {
        /// Subject used for every file.
        #[arg(
            short,
            long,
            conflicts_with = "dir_subject",
            required_unless_present = "dir_subject"
        )]
        subject: Option<String>,

        /// Use each file's parent directory name as its subject (PATHs must be directories).
        #[arg(short = 'd', long = "dir-subject")]
        dir_subject: bool,

        /// Comma-separated newsgroups, overriding global.default_group.
        #[arg(short, long, value_name = "GROUPS")]
        groups: Option<String>,

        /// Files and/or directories to post.
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Show the config file path and effective settings (passwords hidden).
    Config,
}

impl Cli {
    /// Config file to load and its display name.
    fn load_config(&self) -> Result<(PosterConfig, PathBuf)> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => config::config_path()?,
        };
        let cfg = config::load_or_init_at(&path)?;
        tracing::debug!("loaded config from {}: {:?}", path.display(), cfg.redacted());
        Ok((cfg, path))
    }

    pub async fn run(self) -> Result<()> {
        let (cfg, path) = self.load_config()?;

        match self.command {
            CliCommand::Post {
                subject,
                dir_subject: _,
                groups,
                paths,
            } => {
                let mode = match subject {
                    Some(subject) => SubjectMode::Explicit(subject),
                    None => SubjectMode::ParentDirectory,
                };
                run_post(cfg, &path, mode, groups.as_deref(), &paths).await?;
            }
            CliCommand::Config => run_show_config(&cfg, &path)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
