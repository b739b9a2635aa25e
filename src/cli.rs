use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediaforged")]
#[command(author, version, about = "Media library metadata enrichment")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan library directories and refresh metadata for every item
    Refresh {
        /// Library roots (uses `library.paths` from the config if omitted)
        paths: Vec<PathBuf>,

        /// Refresh even when previously fetched data is still fresh
        #[arg(long)]
        force: bool,

        /// Number of items refreshed in parallel
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Write the refreshed items as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// List registered metadata providers in execution order
    Providers,

    /// Display version information
    Version,
}
