//! Experiment driver
//!
//! Ties an [`ExperimentConfig`] to a state store and the replicate engine:
//! the store is opened lazily when `load_state` is set, replicates run with
//! the configured counts, and the store is saved with rotation when
//! `save_state` is set.

use crate::collect;
use crate::config::{ConfigLoader, ExperimentConfig};
use crate::error::ApiError;
use crate::replicate::{ReplicateContext, ReplicateEngine, RunReport};
use crate::state::{LoadMode, SaveOutcome, StateStore};
use crate::value::Value;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Experiment {
    config: ExperimentConfig,
    store: StateStore,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Result<Self, ApiError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(error_msgs.join("; "))
        })?;
        let store = if config.load_state {
            StateStore::open_lazy(&config.state_filename, LoadMode::AllowMissing)
        } else {
            StateStore::new()
        };
        Ok(Self { config, store })
    }

    /// Load configuration from `path` (plus environment) and build.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, ApiError> {
        Self::new(ConfigLoader::load_from_file(path)?)
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run the configured number of replicates of `callable`.
    pub fn run_replicates<F, E>(&self, callable: F) -> Result<RunReport, ApiError>
    where
        F: Fn(&ReplicateContext) -> Result<(), E> + Sync,
        E: fmt::Display,
    {
        let engine = ReplicateEngine::new(self.config.replicate_config()?);
        Ok(engine.run(&self.store, callable)?)
    }

    /// Gather `key` from every replicate under the configured root.
    pub fn collect(&self, key: &str) -> Result<Vec<Value>, ApiError> {
        Ok(collect::collect(&self.store, &self.config.replicate_root, key)?)
    }

    pub fn collect_as<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, ApiError> {
        Ok(collect::collect_as(&self.store, &self.config.replicate_root, key)?)
    }

    /// Save per `save_state`. `None` when saving is disabled.
    pub fn save(&self) -> Result<Option<SaveOutcome>, ApiError> {
        if !self.config.save_state {
            return Ok(None);
        }
        let outcome = self
            .store
            .save(&self.config.state_filename, self.config.rotate_n_state_files)?;
        Ok(Some(outcome))
    }

    /// Run `body`, then save.
    ///
    /// The state is saved even when `body` fails, so completed replicates
    /// survive a partial failure. The body's error takes precedence over a
    /// save error.
    pub fn run<R>(&self, body: impl FnOnce(&Self) -> Result<R, ApiError>) -> Result<R, ApiError> {
        info!(
            state_file = %self.config.state_filename.display(),
            load_state = self.config.load_state,
            save_state = self.config.save_state,
            "Experiment started"
        );
        let result = body(self);
        let saved = self.save();
        match (result, saved) {
            (Ok(value), Ok(_)) => {
                info!("Experiment finished");
                Ok(value)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), saved) => {
                if let Err(save_err) = saved {
                    warn!(error = %save_err, "Saving state after failure also failed");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateAccess;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> ExperimentConfig {
        ExperimentConfig {
            state_filename: dir.path().join("experiment.strata"),
            n_replicates: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_replicates_and_collect() {
        let dir = TempDir::new().unwrap();
        let experiment = Experiment::new(config_in(&dir)).unwrap();

        let squares = experiment
            .run(|exp| {
                exp.run_replicates(|ctx| {
                    let i = ctx.index() as i64;
                    ctx.state().set("square", Value::from(i * i))
                })?;
                exp.collect_as::<i64>("square")
            })
            .unwrap();

        assert_eq!(squares, vec![0, 1, 4]);
        assert!(dir.path().join("experiment.strata").exists());
    }

    #[test]
    fn test_oversized_timeout_rejected_at_construction() {
        let dir = TempDir::new().unwrap();
        let config = ExperimentConfig {
            replicate_timeout_secs: Some(1e20),
            ..config_in(&dir)
        };
        let err = Experiment::new(config).err().unwrap();
        assert!(matches!(err, ApiError::ConfigError(ref msg) if msg.contains("replicate_timeout_secs")));
    }

    #[test]
    fn test_state_is_reloaded_on_next_run() {
        let dir = TempDir::new().unwrap();
        Experiment::new(config_in(&dir))
            .unwrap()
            .run(|exp| Ok(exp.store().set("params.seed", Value::from(11i64))?))
            .unwrap();

        let again = Experiment::new(config_in(&dir)).unwrap();
        assert_eq!(again.store().get("params.seed").unwrap(), Value::from(11i64));
    }

    #[test]
    fn test_load_and_save_disabled() {
        let dir = TempDir::new().unwrap();
        Experiment::new(config_in(&dir))
            .unwrap()
            .run(|exp| Ok(exp.store().set("x", Value::from(1i64))?))
            .unwrap();

        let mut config = config_in(&dir);
        config.load_state = false;
        config.save_state = false;
        let fresh = Experiment::new(config).unwrap();
        assert!(!fresh.store().contains("x").unwrap());
        assert_eq!(fresh.save().unwrap(), None);
    }

    #[test]
    fn test_rotation_from_config() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.rotate_n_state_files = 2;
        for run in 0..3i64 {
            let experiment = Experiment::new(config.clone()).unwrap();
            experiment.store().set("run", Value::from(run)).unwrap();
            experiment.save().unwrap();
        }
        assert!(dir.path().join("experiment.strata.1").exists());
        assert!(dir.path().join("experiment.strata.2").exists());
        assert!(!dir.path().join("experiment.strata.3").exists());
    }

    #[test]
    fn test_failed_body_still_saves() {
        let dir = TempDir::new().unwrap();
        let experiment = Experiment::new(config_in(&dir)).unwrap();
        let result: Result<(), ApiError> = experiment.run(|exp| {
            exp.run_replicates(|ctx| {
                if ctx.index() == 1 {
                    return Err("diverged".to_string());
                }
                ctx.state()
                    .set("ok", Value::from(true))
                    .map_err(|e| e.to_string())
            })?;
            Ok(())
        });
        assert!(matches!(result, Err(ApiError::Replicate(_))));

        let reloaded = StateStore::open(dir.path().join("experiment.strata"), LoadMode::Require).unwrap();
        assert!(reloaded.contains("replicates.0.ok").unwrap());
        assert!(reloaded.contains("replicates.2.ok").unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExperimentConfig {
            n_replicates: 0,
            ..Default::default()
        };
        assert!(matches!(Experiment::new(config), Err(ApiError::ConfigError(_))));
    }
}
