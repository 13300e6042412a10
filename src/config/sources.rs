//! Configuration sources: the experiment TOML file and STRATA__* variables.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use config::FileFormat;
use std::path::Path;
use tracing::debug;

/// Separator between the prefix and nested keys, e.g. `STRATA__LOGGING__LEVEL`.
pub const ENV_SEPARATOR: &str = "__";

/// Add an experiment file. An explicitly named file must exist.
pub fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let name = path
        .to_str()
        .ok_or_else(|| ConfigError::Message(format!("Non UTF-8 config path: {:?}", path)))?;
    if !path.exists() {
        return Err(ConfigError::NotFound(name.to_string()));
    }
    debug!(config_path = %path.display(), "Adding experiment config file");
    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(true)))
}

/// Add environment overrides under `prefix`.
pub fn add_env(builder: ConfigBuilder<DefaultState>, prefix: &str) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(prefix)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    )
}
