//! Disk-backed memoization
//!
//! [`Memoized`] composes a pure function with a cache held in any
//! [`StateAccess`]. Each entry lives at `<root>.<name>.<key>` as a group with
//! two leaves, `value` and `computed_at`. The key is the blake3 hash of the
//! canonical JSON encoding of `(name, args)`: object keys are sorted, so the
//! key does not depend on memory layout or on the iteration order of maps in
//! the arguments. Results go through [`Value`] unchanged, so non-finite floats
//! are cached like any other number. Entries are never invalidated automatically.

use crate::error::StoreError;
use crate::state::StateAccess;
use crate::store::path::NamespacePath;
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Map;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Default namespace for cache entries.
pub const DEFAULT_MEMO_ROOT: &str = "memo";

const VALUE_LEAF: &str = "value";
const COMPUTED_AT_LEAF: &str = "computed_at";

/// Hit/miss counters for one wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
}

/// A function whose results are cached in a state namespace.
#[derive(Debug)]
pub struct Memoized<F> {
    name: String,
    namespace: NamespacePath,
    func: F,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Wrap `func` under the default memo root.
pub fn memoize<F>(name: &str, func: F) -> Result<Memoized<F>, StoreError> {
    Memoized::new(name, func)
}

impl<F> Memoized<F> {
    /// Wrap `func`. `name` identifies the function in cache keys and must be
    /// a valid path segment.
    pub fn new(name: &str, func: F) -> Result<Self, StoreError> {
        let namespace = NamespacePath::parse(DEFAULT_MEMO_ROOT)?.child(name)?;
        Ok(Self {
            name: name.to_string(),
            namespace,
            func,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Store entries under `root` instead of [`DEFAULT_MEMO_ROOT`].
    pub fn with_root(mut self, root: &str) -> Result<Self, StoreError> {
        self.namespace = NamespacePath::parse(root)?.child(self.name.as_str())?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace holding this function's entries.
    pub fn namespace(&self) -> &NamespacePath {
        &self.namespace
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Deterministic cache key for `args`.
    pub fn cache_key<A: Serialize + ?Sized>(&self, args: &A) -> Result<String, StoreError> {
        let bytes = canonical_json_bytes(&(self.name.as_str(), args))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Call through the cache.
    ///
    /// On a hit the stored result is returned and `func` is not invoked. On a
    /// miss `func` runs; its result is stored only if it succeeds, and its
    /// error is returned unchanged otherwise.
    pub fn call<S, A, R, E>(&self, state: &S, args: &A) -> Result<R, E>
    where
        S: StateAccess + ?Sized,
        F: Fn(&A) -> Result<R, E>,
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
        E: From<StoreError>,
    {
        let key = self.cache_key(args)?;
        let entry = self.namespace.child(key.as_str())?;
        let value_path = entry.child(VALUE_LEAF)?.to_string();

        if state.contains(&value_path)? {
            match state.get(&value_path)?.deserialize_into::<R>() {
                Ok(result) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(function = %self.name, key = %key, "Memo hit");
                    return Ok(result);
                }
                Err(e) => {
                    debug!(function = %self.name, key = %key, error = %e, "Memo entry unreadable, recomputing");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(function = %self.name, key = %key, "Memo miss");
        let result = (self.func)(args)?;

        state.set(&value_path, Value::from_serialize(&result)?)?;
        state.set(
            &entry.child(COMPUTED_AT_LEAF)?.to_string(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        )?;
        Ok(result)
    }

    /// Remove every cached entry of this function from `state`.
    pub fn clear<S: StateAccess + ?Sized>(&self, state: &S) -> Result<(), StoreError> {
        let namespace = self.namespace.to_string();
        if state.contains(&namespace)? {
            state.delete(&namespace)?;
        }
        Ok(())
    }
}

/// Canonical JSON encoding: object keys sorted at every depth, non-finite
/// floats written as their names.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let json = Value::from_serialize(value)?.to_json();
    serde_json::to_vec(&canonicalize(json))
        .map_err(|e| StoreError::Conversion(format!("Failed to write memo arguments: {}", e)))
}

fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Json::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Json::Object(ordered.into_iter().collect::<Map<_, _>>())
        }
        Json::Array(values) => Json::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
