//! Replicate execution engine
//!
//! Runs a callable `n` times, each run bound to its own child namespace
//! `<root>.<index>` of the state store. Replicates write into private trees
//! which are merged into the store in index order after every run has
//! finished, so the store mutex is never contended by workers.
//!
//! Failures (errors, panics, timeouts) are isolated per replicate and
//! reported together once the run completes.

pub mod context;
pub mod report;

pub use context::{ReplicateContext, ReplicateScope};
pub use report::{FailureCause, ReplicateFailure, RunReport};

use crate::error::ReplicateError;
use crate::state::StateStore;
use crate::store::path::{parse_index, NamespacePath};
use crate::store::tree::StateTree;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default root namespace for replicate results.
pub const DEFAULT_REPLICATE_ROOT: &str = "replicates";

/// How a run is executed.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub n: usize,
    /// Run on a worker pool instead of the calling thread.
    pub parallel: bool,
    /// Pool size; 0 means available hardware concurrency. Clamped to `n`.
    pub max_workers: usize,
    /// Stop starting new replicates after the first failure.
    pub fail_fast: bool,
    /// Per-replicate wall time limit. Not preemptive.
    pub timeout: Option<Duration>,
    pub root: NamespacePath,
    /// Continue numbering after the highest existing index instead of
    /// clearing the root.
    pub append: bool,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            n: 1,
            parallel: false,
            max_workers: 0,
            fail_fast: false,
            timeout: None,
            root: NamespacePath::root().child_trusted(DEFAULT_REPLICATE_ROOT),
            append: false,
        }
    }
}

impl ReplicateConfig {
    /// Sequential run of `n` replicates.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            ..Default::default()
        }
    }

    /// Switch to parallel execution with `max_workers` workers (0 = auto).
    pub fn parallel(mut self, max_workers: usize) -> Self {
        self.parallel = true;
        self.max_workers = max_workers;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_root(mut self, root: NamespacePath) -> Self {
        self.root = root;
        self
    }

    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Number of pool threads a parallel run uses.
    pub fn worker_count(&self) -> usize {
        let requested = if self.max_workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.max_workers
        };
        requested.min(self.n).max(1)
    }
}

struct Outcome {
    index: usize,
    tree: StateTree,
    result: Result<(), FailureCause>,
}

/// Executes replicate runs against a [`StateStore`].
#[derive(Debug, Clone, Default)]
pub struct ReplicateEngine {
    config: ReplicateConfig,
}

impl ReplicateEngine {
    pub fn new(config: ReplicateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReplicateConfig {
        &self.config
    }

    /// Run `callable` once per replicate.
    ///
    /// Returns the report when every replicate succeeded, and
    /// [`ReplicateError::Failed`] carrying the same report otherwise. Writes
    /// of failed replicates are merged like any other. A replicate whose
    /// writes cannot be merged is reported as [`FailureCause::MergeFailed`];
    /// the remaining replicates are still merged.
    pub fn run<F, E>(&self, store: &StateStore, callable: F) -> Result<RunReport, ReplicateError>
    where
        F: Fn(&ReplicateContext) -> Result<(), E> + Sync,
        E: fmt::Display,
    {
        let config = &self.config;
        if config.root.is_root() {
            return Err(ReplicateError::InvalidArgument(
                "replicate root must not be the store root".to_string(),
            ));
        }
        if config.n == 0 {
            debug!("No replicates requested");
            return Ok(RunReport::default());
        }

        let started = Instant::now();
        let first_index = self.prepare_root(store)?;
        info!(
            n = config.n,
            first_index,
            parallel = config.parallel,
            workers = if config.parallel { config.worker_count() } else { 1 },
            root = %config.root,
            "Starting replicate run"
        );

        let mut outcomes = if config.parallel {
            self.run_parallel(store, first_index, &callable)?
        } else {
            self.run_sequential(store, first_index, &callable)
        };
        outcomes.sort_by_key(|outcome| outcome.index);

        let mut report = RunReport {
            requested: config.n,
            first_index,
            ..Default::default()
        };
        let ran: BTreeSet<usize> = outcomes.iter().map(|o| o.index).collect();
        report.skipped = (first_index..first_index + config.n)
            .filter(|index| !ran.contains(index))
            .collect();

        for outcome in outcomes {
            let mut result = outcome.result;
            if !outcome.tree.is_empty() {
                if let Err(e) = store.merge_subtree(&config.root.indexed(outcome.index), outcome.tree) {
                    result = Err(FailureCause::MergeFailed {
                        error: e.to_string(),
                        previous: result.err().map(Box::new),
                    });
                }
            }
            match result {
                Ok(()) => report.completed.push(outcome.index),
                Err(cause) => {
                    warn!(index = outcome.index, cause = %cause, "Replicate failed");
                    report.failures.push(ReplicateFailure {
                        index: outcome.index,
                        cause,
                    });
                }
            }
        }
        report.elapsed = started.elapsed();

        info!(
            completed = report.completed.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Replicate run finished"
        );

        if report.failures.is_empty() {
            Ok(report)
        } else {
            Err(ReplicateError::Failed { report })
        }
    }

    /// Clear the root, or find the first free index in append mode.
    fn prepare_root(&self, store: &StateStore) -> Result<usize, ReplicateError> {
        let root = &self.config.root;
        if !self.config.append {
            if store.remove(root)? {
                debug!(root = %root, "Cleared previous replicate results");
            }
            return Ok(0);
        }
        let next = store
            .children_or_empty(root)?
            .iter()
            .filter_map(|name| parse_index(name))
            .max()
            .map_or(0, |highest| highest + 1);
        Ok(next)
    }

    fn run_sequential<F, E>(&self, store: &StateStore, first_index: usize, callable: &F) -> Vec<Outcome>
    where
        F: Fn(&ReplicateContext) -> Result<(), E>,
        E: fmt::Display,
    {
        let mut outcomes = Vec::with_capacity(self.config.n);
        for offset in 0..self.config.n {
            let outcome = self.execute(store, first_index + offset, callable);
            let failed = outcome.result.is_err();
            outcomes.push(outcome);
            if failed && self.config.fail_fast {
                break;
            }
        }
        outcomes
    }

    fn run_parallel<F, E>(
        &self,
        store: &StateStore,
        first_index: usize,
        callable: &F,
    ) -> Result<Vec<Outcome>, ReplicateError>
    where
        F: Fn(&ReplicateContext) -> Result<(), E> + Sync,
        E: fmt::Display,
    {
        let n = self.config.n;
        let workers = self.config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("strata-replicate-{}", i))
            .build()
            .map_err(|e| ReplicateError::WorkerPool(e.to_string()))?;

        let next = AtomicUsize::new(0);
        let halted = AtomicBool::new(false);
        let finished = Mutex::new(Vec::with_capacity(n));

        pool.install(|| {
            (0..workers).into_par_iter().for_each(|_| loop {
                if halted.load(Ordering::SeqCst) {
                    break;
                }
                let offset = next.fetch_add(1, Ordering::SeqCst);
                if offset >= n {
                    break;
                }
                let outcome = self.execute(store, first_index + offset, callable);
                if outcome.result.is_err() && self.config.fail_fast {
                    halted.store(true, Ordering::SeqCst);
                }
                finished.lock().push(outcome);
            });
        });

        Ok(finished.into_inner())
    }

    fn execute<F, E>(&self, store: &StateStore, index: usize, callable: &F) -> Outcome
    where
        F: Fn(&ReplicateContext) -> Result<(), E>,
        E: fmt::Display,
    {
        let ctx = ReplicateContext::new(index, self.config.root.indexed(index), store.clone());
        let started = Instant::now();
        let returned = panic::catch_unwind(AssertUnwindSafe(|| callable(&ctx)));
        let elapsed = started.elapsed();

        let result = match returned {
            Ok(Ok(())) => match self.config.timeout {
                Some(limit) if elapsed > limit => Err(FailureCause::TimedOut { elapsed, limit }),
                _ => Ok(()),
            },
            Ok(Err(e)) => Err(FailureCause::Error(e.to_string())),
            Err(payload) => Err(FailureCause::Panicked(panic_message(payload.as_ref()))),
        };
        debug!(index, elapsed_ms = elapsed.as_millis() as u64, ok = result.is_ok(), "Replicate done");

        Outcome {
            index,
            tree: ctx.into_tree(),
            result,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
