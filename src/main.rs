//! repocache - local artifact cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use repocache::cli::{Cli, Commands};
use repocache::config::ConfigManager;
use repocache::error::RepoCacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            } else if e.is_retryable() {
                eprintln!("{} {}", style("Hint:").yellow(), "This may be transient; try again");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RepoCacheResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Using config {}", config_manager.path().display());

    let root = cli
        .cache_root
        .clone()
        .unwrap_or_else(|| config.cache.root_or_default());
    debug!("Cache root {}", root.display());

    match cli.command {
        Commands::Populate(args) => repocache::cli::commands::populate(args, &config, &root).await,
        Commands::Rebuild(args) => repocache::cli::commands::rebuild(args, &config, &root).await,
        Commands::Status => repocache::cli::commands::status(&config, &root).await,
        Commands::Config(args) => {
            repocache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("repocache=warn"),
        1 => EnvFilter::new("repocache=info"),
        _ => EnvFilter::new("repocache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
