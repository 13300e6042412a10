//! ConfigLoader: assembles defaults, file and environment into an
//! [`ExperimentConfig`].

use super::merge_policy::builder_with_defaults;
use super::sources;
use super::ExperimentConfig;
use crate::error::ApiError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default prefix for environment overrides.
pub const ENV_PREFIX: &str = "STRATA";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Load and validate.
    pub fn load(&self) -> Result<ExperimentConfig, ApiError> {
        let mut builder = builder_with_defaults()?;
        if let Some(file) = &self.file {
            builder = sources::add_file(builder, file)?;
        }
        builder = sources::add_env(builder, &self.env_prefix);

        let config: ExperimentConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        debug!(
            file = ?self.file,
            n_replicates = config.n_replicates,
            state_filename = %config.state_filename.display(),
            "Loaded experiment configuration"
        );
        Ok(config)
    }

    /// Defaults overlaid with `path` and the environment.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ExperimentConfig, ApiError> {
        Self::new().with_file(path).load()
    }
}
