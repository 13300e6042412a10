//! Outcome of a replicate run

use std::fmt;
use std::time::Duration;

/// Why a replicate failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The callable returned an error.
    Error(String),
    /// The callable panicked.
    Panicked(String),
    /// The callable finished but exceeded the per-replicate timeout.
    TimedOut { elapsed: Duration, limit: Duration },
    /// The replicate's writes could not be merged into the store. `previous`
    /// holds the replicate's own failure, if it had one.
    MergeFailed {
        error: String,
        previous: Option<Box<FailureCause>>,
    },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Error(message) => write!(f, "{}", message),
            FailureCause::Panicked(message) => write!(f, "panicked: {}", message),
            FailureCause::TimedOut { elapsed, limit } => write!(
                f,
                "timed out after {:.3}s (limit {:.3}s)",
                elapsed.as_secs_f64(),
                limit.as_secs_f64()
            ),
            FailureCause::MergeFailed {
                error,
                previous: None,
            } => write!(f, "merge failed: {}", error),
            FailureCause::MergeFailed {
                error,
                previous: Some(previous),
            } => write!(f, "merge failed: {} (after: {})", error, previous),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateFailure {
    pub index: usize,
    pub cause: FailureCause,
}

/// Summary of one [`crate::replicate::ReplicateEngine::run`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Number of replicates asked for.
    pub requested: usize,
    /// First index of this run; non-zero only in append mode.
    pub first_index: usize,
    /// Indices that finished successfully, ascending.
    pub completed: Vec<usize>,
    /// Failed indices, ascending.
    pub failures: Vec<ReplicateFailure>,
    /// Indices never started because of fail-fast, ascending.
    pub skipped: Vec<usize>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }

    /// Every index this run covered, whether or not it ran.
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.first_index..self.first_index + self.requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_display() {
        assert_eq!(FailureCause::Error("bad input".into()).to_string(), "bad input");
        assert_eq!(FailureCause::Panicked("boom".into()).to_string(), "panicked: boom");
        let timed = FailureCause::TimedOut {
            elapsed: Duration::from_millis(1500),
            limit: Duration::from_secs(1),
        };
        assert_eq!(timed.to_string(), "timed out after 1.500s (limit 1.000s)");
        let merge = FailureCause::MergeFailed {
            error: "conflict".into(),
            previous: Some(Box::new(FailureCause::Error("bad input".into()))),
        };
        assert_eq!(merge.to_string(), "merge failed: conflict (after: bad input)");
    }

    #[test]
    fn test_report_indices() {
        let report = RunReport {
            requested: 3,
            first_index: 5,
            completed: vec![5, 7],
            failures: vec![ReplicateFailure {
                index: 6,
                cause: FailureCause::Error("x".into()),
            }],
            ..Default::default()
        };
        assert_eq!(report.indices().collect::<Vec<_>>(), vec![5, 6, 7]);
        assert_eq!(report.failed_indices(), vec![6]);
        assert!(!report.is_success());
    }
}
