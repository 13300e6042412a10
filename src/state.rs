//! Persistent state store
//!
//! [`StateStore`] is a cloneable handle to one lock-guarded [`StateTree`].
//! Every operation takes the store mutex for the duration of an in-memory
//! map operation; the file is touched only by load, save and reset.
//!
//! A store opened lazily loads its file on the first operation. The load
//! happens once per handle lifetime, even if it fails.

use crate::error::StoreError;
use crate::store::path::NamespacePath;
use crate::store::persistence;
use crate::store::tree::StateTree;
use crate::value::Value;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Read/write access to a hierarchical namespace.
///
/// Implemented by [`StateStore`] and by the per-replicate scope handed to
/// replicate callables, so memoization and collection work over either.
pub trait StateAccess {
    /// Read the leaf at `path`.
    fn get(&self, path: &str) -> Result<Value, StoreError>;

    /// Create or overwrite the leaf at `path`.
    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// True if `path` is a leaf or a group.
    fn contains(&self, path: &str) -> Result<bool, StoreError>;

    /// Remove a leaf or subtree.
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Immediate children of the group at `path`, in order.
    fn children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError>
    where
        Self: Sized,
    {
        self.get(path)?.deserialize_into()
    }

    fn set_as<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.set(path, Value::from_serialize(value)?)
    }
}

/// What to do when the state file does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Start from an empty store.
    #[default]
    AllowMissing,
    /// Fail with [`StoreError::MissingFile`].
    Require,
}

/// Result of a save call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// Nothing changed since the last load/save of the same file.
    Skipped,
}

#[derive(Debug)]
struct PendingLoad {
    path: PathBuf,
    mode: LoadMode,
}

#[derive(Debug, Default)]
struct StoreInner {
    tree: StateTree,
    dirty: bool,
    /// File last loaded from or saved to.
    source: Option<PathBuf>,
    pending: Option<PendingLoad>,
}

impl StoreInner {
    fn ensure_loaded(&mut self) -> Result<(), StoreError> {
        if let Some(pending) = self.pending.take() {
            debug!(path = %pending.path.display(), "Lazy state load triggered");
            self.load_now(&pending.path, pending.mode)?;
        }
        Ok(())
    }

    fn load_now(&mut self, path: &Path, mode: LoadMode) -> Result<(), StoreError> {
        let tree = match persistence::load_from_disk(path)? {
            Some(tree) => tree,
            None if mode == LoadMode::AllowMissing => StateTree::new(),
            None => return Err(StoreError::MissingFile(path.to_path_buf())),
        };
        self.tree = tree;
        self.dirty = false;
        self.source = Some(path.to_path_buf());
        Ok(())
    }
}

/// Shared handle to a persistent state tree.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl StateStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store and load `path` immediately.
    pub fn open<P: AsRef<Path>>(path: P, mode: LoadMode) -> Result<Self, StoreError> {
        let store = Self::new();
        store.load(path, mode)?;
        Ok(store)
    }

    /// Open a store whose file is loaded on first access.
    pub fn open_lazy<P: AsRef<Path>>(path: P, mode: LoadMode) -> Self {
        let store = Self::new();
        store.load_lazy(path, mode);
        store
    }

    /// Replace the in-memory content with the file at `path`.
    pub fn load<P: AsRef<Path>>(&self, path: P, mode: LoadMode) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.pending = None;
        inner.load_now(path.as_ref(), mode)
    }

    /// Discard the in-memory content and defer loading `path` until the next
    /// operation.
    pub fn load_lazy<P: AsRef<Path>>(&self, path: P, mode: LoadMode) {
        let mut inner = self.inner.lock();
        inner.tree = StateTree::new();
        inner.dirty = false;
        inner.pending = Some(PendingLoad {
            path: path.as_ref().to_path_buf(),
            mode,
        });
    }

    /// Serialize the whole tree to `path`, rotating `rotate_n` backups.
    ///
    /// Skipped when nothing changed since the last load/save of that same,
    /// still existing, file.
    pub fn save<P: AsRef<Path>>(&self, path: P, rotate_n: usize) -> Result<SaveOutcome, StoreError> {
        let path = path.as_ref();
        let mut inner = self.inner.lock();
        inner.ensure_loaded()?;

        let same_file = inner.source.as_deref() == Some(path);
        if !inner.dirty && same_file && path.exists() {
            info!(path = %path.display(), "State unchanged, save skipped");
            return Ok(SaveOutcome::Skipped);
        }

        persistence::save_to_disk(path, &inner.tree, rotate_n)?;
        inner.dirty = false;
        inner.source = Some(path.to_path_buf());
        Ok(SaveOutcome::Written)
    }

    /// Clear the store. With `delete_files`, also remove the current state
    /// file and its numbered backups.
    pub fn reset(&self, delete_files: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let source = inner
            .source
            .take()
            .or_else(|| inner.pending.as_ref().map(|p| p.path.clone()));
        inner.tree = StateTree::new();
        inner.dirty = false;
        inner.pending = None;
        if delete_files {
            if let Some(path) = source {
                let removed = persistence::remove_with_backups(&path)?;
                info!(path = %path.display(), removed, "Deleted state files");
            }
        }
        Ok(())
    }

    /// Clone of the current tree.
    pub fn snapshot(&self) -> Result<StateTree, StoreError> {
        self.with_tree(|tree| Ok(tree.clone()))
    }

    /// Every leaf path, depth-first in key order.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.with_tree(|tree| Ok(tree.leaves().into_iter().map(|(k, _)| k.to_string()).collect()))
    }

    /// Number of leaves.
    pub fn len(&self) -> Result<usize, StoreError> {
        self.with_tree(|tree| Ok(tree.len()))
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.with_tree(|tree| Ok(tree.is_empty()))
    }

    /// True if mutated since the last load/save.
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    /// File last loaded from or saved to, or the pending lazy file.
    pub fn source(&self) -> Option<PathBuf> {
        let inner = self.inner.lock();
        inner
            .source
            .clone()
            .or_else(|| inner.pending.as_ref().map(|p| p.path.clone()))
    }

    /// Merge `tree` into the group at `path`.
    pub fn merge_subtree(&self, path: &NamespacePath, tree: StateTree) -> Result<(), StoreError> {
        self.with_tree_mut(|inner| inner.graft(path, tree))
    }

    /// Remove `path` if present. Returns whether anything was removed.
    pub fn remove(&self, path: &NamespacePath) -> Result<bool, StoreError> {
        self.with_tree_mut(|tree| {
            if !tree.contains(path) {
                return Ok(false);
            }
            tree.delete(path)?;
            Ok(true)
        })
    }

    /// Children of `path`, or an empty list when it does not exist.
    pub fn children_or_empty(&self, path: &NamespacePath) -> Result<Vec<String>, StoreError> {
        self.with_tree(|tree| {
            if !tree.contains(path) {
                return Ok(Vec::new());
            }
            tree.children(path)
        })
    }

    fn with_tree<R>(
        &self,
        f: impl FnOnce(&StateTree) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut inner = self.inner.lock();
        inner.ensure_loaded()?;
        f(&inner.tree)
    }

    fn with_tree_mut<R>(
        &self,
        f: impl FnOnce(&mut StateTree) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut inner = self.inner.lock();
        inner.ensure_loaded()?;
        let result = f(&mut inner.tree)?;
        inner.dirty = true;
        Ok(result)
    }
}

impl StateAccess for StateStore {
    fn get(&self, path: &str) -> Result<Value, StoreError> {
        let path = NamespacePath::parse(path)?;
        self.with_tree(|tree| tree.get(&path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = NamespacePath::parse(path)?;
        self.with_tree_mut(|tree| tree.set(&path, value))
    }

    fn contains(&self, path: &str) -> Result<bool, StoreError> {
        let path = NamespacePath::parse(path)?;
        self.with_tree(|tree| Ok(tree.contains(&path)))
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let path = NamespacePath::parse(path)?;
        self.with_tree_mut(|tree| tree.delete(&path).map(|_| ()))
    }

    fn children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let path = NamespacePath::parse(path)?;
        self.with_tree(|tree| tree.children(&path))
    }
}
