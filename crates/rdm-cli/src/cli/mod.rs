//! CLI for the RDM download manager.

mod commands;
mod format;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rdm_core::config;
use std::path::PathBuf;

use commands::{run_config, run_get, GetOptions};

/// Top-level CLI for the RDM download manager.
#[derive(Debug, Parser)]
#[command(name = "rdm")]
#[command(about = "RDM: resumable multi-connection HTTP download manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs and wait until every job has ended.
    Get {
        /// Direct HTTP/HTTPS URLs to download.
        #[arg(required = true)]
        urls: Vec<String>,
        /// Destination directory (default: configured download directory).
        #[arg(short = 'd', long = "dir", value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Connections per job; overrides the config file.
        #[arg(short = 'c', long, value_name = "N")]
        connections: Option<usize>,
        /// Jobs transferring at the same time; overrides the config file.
        #[arg(short = 'j', long, value_name = "N")]
        jobs: Option<usize>,
        /// Automatic retries per job; overrides the config file.
        #[arg(long, value_name = "N")]
        retries: Option<u32>,
        /// Print engine events as JSON lines instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show the config file path and the effective configuration.
    Config,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                urls,
                dir,
                connections,
                jobs,
                retries,
                json,
            } => run_get(
                &cfg,
                GetOptions {
                    urls,
                    dir,
                    connections,
                    jobs,
                    retries,
                    json,
                },
            )?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
