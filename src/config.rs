//! Configuration System
//!
//! Experiment options loaded with the `config` crate: builder defaults, then
//! an optional TOML file, then `STRATA__*` environment variables.

use crate::error::ReplicateError;
use crate::logging::LoggingConfig;
use crate::replicate::ReplicateConfig;
use crate::store::path::NamespacePath;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod loader;
mod merge_policy;
mod sources;

pub use loader::{ConfigLoader, ENV_PREFIX};
pub use sources::ENV_SEPARATOR;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// State file read at start and written at the end
    #[serde(default = "default_state_filename")]
    pub state_filename: PathBuf,

    /// Number of numbered backups kept when saving
    #[serde(default)]
    pub rotate_n_state_files: usize,

    /// Load the state file before running
    #[serde(default = "default_true")]
    pub load_state: bool,

    /// Save the state file after running
    #[serde(default = "default_true")]
    pub save_state: bool,

    #[serde(default = "default_n_replicates")]
    pub n_replicates: usize,

    /// Run replicates on a worker pool
    #[serde(default)]
    pub parallel: bool,

    /// Worker pool size, 0 for one per hardware thread
    #[serde(default, alias = "processes")]
    pub max_workers: usize,

    #[serde(default)]
    pub fail_fast: bool,

    /// Per-replicate wall time limit in seconds
    #[serde(default)]
    pub replicate_timeout_secs: Option<f64>,

    /// Namespace holding replicate results
    #[serde(default = "default_replicate_root")]
    pub replicate_root: String,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_state_filename() -> PathBuf {
    PathBuf::from("experiment_state.strata")
}

fn default_true() -> bool {
    true
}

fn default_n_replicates() -> usize {
    1
}

fn default_replicate_root() -> String {
    crate::replicate::DEFAULT_REPLICATE_ROOT.to_string()
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            state_filename: default_state_filename(),
            rotate_n_state_files: 0,
            load_state: true,
            save_state: true,
            n_replicates: default_n_replicates(),
            parallel: false,
            max_workers: 0,
            fail_fast: false,
            replicate_timeout_secs: None,
            replicate_root: default_replicate_root(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    State(String),
    Replicates(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::State(msg) => write!(f, "State: {}", msg),
            ValidationError::Replicates(msg) => write!(f, "Replicates: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ExperimentConfig {
    /// Validate the entire configuration, reporting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.state_filename.as_os_str().is_empty() {
            errors.push(ValidationError::State(
                "state_filename cannot be empty".to_string(),
            ));
        }

        if self.n_replicates == 0 {
            errors.push(ValidationError::Replicates(
                "n_replicates must be at least 1".to_string(),
            ));
        }
        if let Some(timeout) = self.replicate_timeout_secs {
            if let Err(msg) = timeout_duration(timeout) {
                errors.push(ValidationError::Replicates(msg));
            }
        }
        match NamespacePath::parse(&self.replicate_root) {
            Ok(root) if root.is_root() => errors.push(ValidationError::Replicates(
                "replicate_root cannot be empty".to_string(),
            )),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::Replicates(e.to_string())),
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Engine settings for these options.
    pub fn replicate_config(&self) -> Result<ReplicateConfig, ReplicateError> {
        let timeout = self
            .replicate_timeout_secs
            .map(timeout_duration)
            .transpose()
            .map_err(ReplicateError::InvalidArgument)?;
        Ok(ReplicateConfig {
            n: self.n_replicates,
            parallel: self.parallel,
            max_workers: self.max_workers,
            fail_fast: self.fail_fast,
            timeout,
            root: NamespacePath::parse(&self.replicate_root)?,
            append: false,
        })
    }
}

/// Non-zero duration for a timeout in seconds.
fn timeout_duration(secs: f64) -> Result<Duration, String> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(format!(
            "replicate_timeout_secs must be a positive duration in seconds, got {}",
            secs
        )),
    }
}
