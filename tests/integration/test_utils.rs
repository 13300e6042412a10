//! Shared test utilities for integration tests

use std::path::PathBuf;
use strata::{StateAccess, StateStore, Value};
use tempfile::TempDir;

/// A temp directory with a state file path inside it.
pub struct StateFixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl StateFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("experiment.strata");
        Self { dir, path }
    }

    pub fn backup(&self, k: usize) -> PathBuf {
        self.dir.path().join(format!("experiment.strata.{}", k))
    }
}

/// The classic mixed fixture: a heterogeneous list and a nested int.
pub fn populated_store() -> StateStore {
    let store = StateStore::new();
    store
        .set(
            "list",
            Value::from(vec![
                Value::from(1i64),
                Value::from(2i64),
                Value::from("a"),
                Value::from(1.2),
            ]),
        )
        .unwrap();
    store.set("values.int", Value::from(123i64)).unwrap();
    store
}
