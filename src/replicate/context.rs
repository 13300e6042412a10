//! Per-replicate state binding

use crate::error::StoreError;
use crate::state::{StateAccess, StateStore};
use crate::store::path::NamespacePath;
use crate::store::tree::StateTree;
use crate::value::Value;
use parking_lot::Mutex;

/// Private namespace of one replicate.
///
/// Paths are relative to the replicate's own node (`<root>.<index>`). Writes
/// land in a private tree that the engine merges into the store once the run
/// has joined.
#[derive(Debug, Default)]
pub struct ReplicateScope {
    tree: Mutex<StateTree>,
}

impl ReplicateScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_tree(self) -> StateTree {
        self.tree.into_inner()
    }
}

impl StateAccess for ReplicateScope {
    fn get(&self, path: &str) -> Result<Value, StoreError> {
        let path = NamespacePath::parse(path)?;
        self.tree.lock().get(&path).cloned()
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = NamespacePath::parse(path)?;
        self.tree.lock().set(&path, value)
    }

    fn contains(&self, path: &str) -> Result<bool, StoreError> {
        let path = NamespacePath::parse(path)?;
        Ok(self.tree.lock().contains(&path))
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let path = NamespacePath::parse(path)?;
        self.tree.lock().delete(&path).map(|_| ())
    }

    fn children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let path = NamespacePath::parse(path)?;
        self.tree.lock().children(&path)
    }
}

/// What a replicate callable sees.
#[derive(Debug)]
pub struct ReplicateContext {
    index: usize,
    namespace: NamespacePath,
    scope: ReplicateScope,
    shared: StateStore,
}

impl ReplicateContext {
    pub(crate) fn new(index: usize, namespace: NamespacePath, shared: StateStore) -> Self {
        Self {
            index,
            namespace,
            scope: ReplicateScope::new(),
            shared,
        }
    }

    /// Replicate index, unique within the replicate root.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Absolute path of this replicate's node in the shared store.
    pub fn namespace(&self) -> &NamespacePath {
        &self.namespace
    }

    /// State rooted at this replicate's node.
    pub fn state(&self) -> &ReplicateScope {
        &self.scope
    }

    /// The parent store. Writes made here are visible immediately to every
    /// replicate; reads do not see other replicates' scoped writes until the
    /// run has merged them.
    pub fn shared(&self) -> &StateStore {
        &self.shared
    }

    pub(crate) fn into_tree(self) -> StateTree {
        self.scope.into_tree()
    }
}
