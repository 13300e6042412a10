//! strata CLI Binary
//!
//! Inspect experiment state files.

use anyhow::Context;
use clap::Parser;
use std::io::IsTerminal;
use std::process;
use strata::cli::{self, Cli};
use strata::logging::init_logging;
use tracing::{debug, error};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(Some(&cli::logging_config(&cli))) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    match run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let color = !cli.no_color && std::io::stdout().is_terminal();
    debug!(command = ?cli.command, color, "Dispatching command");
    cli::execute(&cli.command, color).context("strata command failed")
}
