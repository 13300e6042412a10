//! Error types for the strata experiment state system.

use crate::replicate::RunReport;
use std::path::PathBuf;
use thiserror::Error;

/// Store-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Not a leaf: {0} holds children, not a value")]
    NotALeaf(String),

    #[error("Path conflict at {0}: a leaf cannot hold children")]
    PathConflict(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Corrupt state file {path:?}: {reason}")]
    CorruptFile { path: PathBuf, reason: String },

    #[error("State file not found: {0:?}")]
    MissingFile(PathBuf),

    #[error("Value conversion failed: {0}")]
    Conversion(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Replicate engine errors
#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("{}", describe_failures(.report))]
    Failed { report: RunReport },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ReplicateError {
    /// The run report, when the error came from finished replicates.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            ReplicateError::Failed { report } => Some(report),
            _ => None,
        }
    }
}

fn describe_failures(report: &RunReport) -> String {
    let listed: Vec<String> = report
        .failures
        .iter()
        .map(|f| format!("#{}: {}", f.index, f.cause))
        .collect();
    format!(
        "{} of {} replicates failed ({})",
        report.failures.len(),
        report.requested,
        listed.join("; ")
    )
}

/// Result collection errors
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("No results for '{key}' under '{root}'")]
    NoResults { root: String, key: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Top-level errors for the experiment driver and CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Replicate error: {0}")]
    Replicate(#[from] ReplicateError),

    #[error("Collect error: {0}")]
    Collect(#[from] CollectError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
