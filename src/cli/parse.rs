//! CLI parse: clap types for strata. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// strata - inspect experiment state files
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(about = "Inspect hierarchical experiment state files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Experiment configuration file (logging settings are taken from it)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a state file (or one group of it)
    Show {
        /// State file
        file: PathBuf,
        /// Only show the group at this path
        #[arg(long)]
        path: Option<String>,
        #[arg(long, value_enum, default_value_t = ShowFormat::Tree)]
        format: ShowFormat,
    },
    /// Print one value as JSON
    Get {
        /// State file
        file: PathBuf,
        /// Dot-separated leaf path
        path: String,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// List leaf paths
    Keys {
        /// State file
        file: PathBuf,
        /// Only list paths under this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowFormat {
    Tree,
    Table,
    Json,
}
