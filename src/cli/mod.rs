//! CLI argument definitions for Almanac.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version string with the build commit and timestamp.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("ALMANAC_GIT_COMMIT"),
    ", built ",
    env!("ALMANAC_BUILD_TIMESTAMP"),
    ")"
);

/// Almanac - test-report aggregation, release sync and release timelines.
///
/// Start with `almanac scan` to see what the report root contains, then
/// `almanac index` to write the navigation and export documents.
#[derive(Parser, Debug)]
#[command(name = "almanac")]
#[command(author, version, long_version = LONG_VERSION, about = "Aggregate test reports, sync release reports and lay out release timelines", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Report root directory (defaults to the current directory).
    /// Can also be set via ALMANAC_ROOT environment variable.
    #[arg(short = 'C', long = "root", global = true, env = "ALMANAC_ROOT")]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the report root and list classified reports
    Scan,

    /// Scan and write index.json plus the api/ export documents
    Index,

    /// Fetch release reports missing from the local store
    Sync {
        /// Local release store (overrides config)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Extract defect metrics from a summary document
    Metrics {
        /// Path to the metrics document
        file: PathBuf,
    },

    /// Lay out the release timeline
    Timeline {
        /// Release events file (defaults to <root>/releases.json)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Query the release database first, falling back to the input file
        #[arg(long)]
        fetch: bool,

        /// Write events fetched from the release database to the input file
        #[arg(long, requires = "fetch")]
        save: bool,

        /// Minimum canvas width in pixels
        #[arg(long)]
        width: Option<f64>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration and where each value came from
    Show,
}
