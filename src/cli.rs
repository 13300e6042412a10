//! CLI domain: clap definitions and the command router.

mod parse;
mod route;

pub use parse::{Cli, Commands, ShowFormat};
pub use route::execute;

use crate::config::ConfigLoader;
use crate::logging::LoggingConfig;

/// Logging settings for the binary.
///
/// Precedence: CLI flags, then the config file, then defaults.
pub fn logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = cli
        .config
        .as_ref()
        .and_then(|path| ConfigLoader::load_from_file(path).ok())
        .map(|c| c.logging)
        .unwrap_or_else(|| LoggingConfig {
            level: "warn".to_string(),
            ..Default::default()
        });

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if cli.no_color {
        config.color = false;
    }
    config
}
