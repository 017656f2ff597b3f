//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// repocache - local cache of Maven-style artifacts
///
/// Keeps resolved artifacts in a durable cache and rebuilds standalone
/// repositories from it.
#[derive(Parser, Debug)]
#[command(name = "repocache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "REPOCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root directory (overrides cache.root from the config)
    #[arg(long, global = true, env = "REPOCACHE_ROOT")]
    pub cache_root: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve and cache artifacts that are not cached yet
    Populate(PopulateArgs),

    /// Rebuild a standalone repository from the cache
    Rebuild(RebuildArgs),

    /// Show what the cache holds
    Status,

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the populate command
#[derive(Parser, Debug)]
pub struct PopulateArgs {
    /// Artifact coordinate as group:name:extension:classifier:version
    #[arg(short, long = "artifact", value_name = "COORDINATE")]
    pub artifacts: Vec<String>,

    /// File with one coordinate per line ('#' starts a comment)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub artifacts_file: Option<PathBuf>,

    /// Comma-separated repository URLs (overrides configured repositories)
    #[arg(short, long, value_name = "URL,URL")]
    pub repositories: Option<String>,

    /// Maximum concurrent resolutions (overrides cache.concurrency)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,
}

/// Arguments for the rebuild command
#[derive(Parser, Debug)]
pub struct RebuildArgs {
    /// Keep the rebuilt repository and print its path
    #[arg(short, long)]
    pub keep: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
