//! Result collection across replicates
//!
//! Walks the numeric children of a replicate root in ascending numeric order
//! (`2` before `10`) and reads one key from each. Replicates without the key
//! are skipped; children that are not canonical decimal indices are ignored.

use crate::error::CollectError;
use crate::state::StateAccess;
use crate::store::path::{parse_index, NamespacePath};
use crate::value::Value;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Values of `key` under each replicate of `root`, in index order.
pub fn collect<S>(state: &S, root: &str, key: &str) -> Result<Vec<Value>, CollectError>
where
    S: StateAccess + ?Sized,
{
    Ok(collect_indexed(state, root, key)?
        .into_iter()
        .map(|(_, value)| value)
        .collect())
}

/// Like [`collect`], paired with the replicate index each value came from.
pub fn collect_indexed<S>(state: &S, root: &str, key: &str) -> Result<Vec<(usize, Value)>, CollectError>
where
    S: StateAccess + ?Sized,
{
    let root_path = NamespacePath::parse(root)?;
    let key_path = NamespacePath::parse(key)?;
    let no_results = || CollectError::NoResults {
        root: root.to_string(),
        key: key.to_string(),
    };

    if !state.contains(root)? {
        return Err(no_results());
    }

    let mut indices: Vec<usize> = state
        .children(root)?
        .iter()
        .filter_map(|name| parse_index(name))
        .collect();
    indices.sort_unstable();

    let mut found = Vec::with_capacity(indices.len());
    for index in indices {
        let path = root_path.indexed(index).join(&key_path).to_string();
        if !state.contains(&path)? {
            debug!(index, key, "Replicate has no value for key");
            continue;
        }
        found.push((index, state.get(&path)?));
    }

    if found.is_empty() {
        return Err(no_results());
    }
    Ok(found)
}

/// Like [`collect`], converting every value to `T`.
pub fn collect_as<T, S>(state: &S, root: &str, key: &str) -> Result<Vec<T>, CollectError>
where
    T: DeserializeOwned,
    S: StateAccess + ?Sized,
{
    collect(state, root, key)?
        .iter()
        .map(|value| value.deserialize_into::<T>().map_err(CollectError::from))
        .collect()
}
