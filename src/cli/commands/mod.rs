//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod scrape;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use crate::scrapers::FetcherKind;

#[derive(Parser)]
#[command(name = "rivalskins")]
#[command(about = "Hero skin catalog crawler and query API")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory (overrides config file and environment)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Page fetcher to use
    #[arg(long, global = true, value_enum)]
    fetcher: Option<FetcherKind>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the query API with the periodic refresh scheduler
    Serve {
        /// Address to bind: port, host, or host:port
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        bind: String,
    },

    /// Run one refresh cycle in the foreground
    Refresh,

    /// List heroes from the roster page
    Heroes {
        /// Ignore cached data
        #[arg(long)]
        fresh: bool,
    },

    /// List a hero's skins with their IDs
    Skins {
        /// Hero name as shown on the roster (case-insensitive)
        hero: String,
        /// Ignore cached data
        #[arg(long)]
        fresh: bool,
    },

    /// Summarize the catalog on disk and the cache state
    Status,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        cache_dir: cli.cache_dir,
    };
    let (mut settings, _config) = load_settings_with_options(options).await;
    if let Some(fetcher) = cli.fetcher {
        settings.fetcher = fetcher;
    }

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
        Commands::Refresh => scrape::cmd_refresh(&settings).await,
        Commands::Heroes { fresh } => scrape::cmd_heroes(&settings, fresh).await,
        Commands::Skins { hero, fresh } => scrape::cmd_skins(&settings, &hero, fresh).await,
        Commands::Status => status::cmd_status(&settings).await,
    }
}
