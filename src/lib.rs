//! Strata: hierarchical persistent experiment state
//!
//! A dot-addressed state tree that persists to a versioned file with
//! rotating backups, a replicate engine that runs a unit of work many times
//! into isolated namespaces, and a memoization layer that caches pure
//! function results in the same store.

pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod memo;
pub mod render;
pub mod replicate;
pub mod state;
pub mod store;
pub mod value;

pub use collect::{collect, collect_as, collect_indexed};
pub use config::{ConfigLoader, ExperimentConfig};
pub use error::{ApiError, CollectError, ReplicateError, StoreError};
pub use experiment::Experiment;
pub use memo::{memoize, Memoized};
pub use replicate::{ReplicateConfig, ReplicateContext, ReplicateEngine, RunReport};
pub use state::{LoadMode, SaveOutcome, StateAccess, StateStore};
pub use store::{NamespacePath, StateTree};
pub use value::Value;
