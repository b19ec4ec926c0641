//! CLI for the fetchq dispatch queue.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fetchq_core::config;

use commands::{run_config, run_get, GetOptions};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fetchq")]
#[command(about = "fetchq: fetch URLs through a bounded pool of workers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch one or more URLs concurrently through the worker pool.
    Get {
        /// HTTP/HTTPS URLs to fetch.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Send a POST instead of a GET.
        #[arg(long)]
        post: bool,

        /// Referer URL sent with every request.
        #[arg(long, value_name = "URL")]
        referer: Option<String>,

        /// Per-request timeout in seconds (overrides the config; 0 = none).
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Form attribute `name=value` (query for GET, body for POST). Repeatable.
        #[arg(long = "attr", value_name = "NAME=VALUE")]
        attrs: Vec<String>,

        /// File part `name=path` of a multipart POST. Repeatable.
        #[arg(long = "file", value_name = "NAME=PATH")]
        files: Vec<String>,

        /// Worker pool size (overrides the config).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Print one JSON object per URL instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                urls,
                post,
                referer,
                timeout,
                attrs,
                files,
                workers,
                json,
            } => {
                let opts =
                    GetOptions::parse(post, referer.as_deref(), timeout, &attrs, &files, json)?;
                run_get(&cfg, workers, &urls, &opts).await?
            }
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
