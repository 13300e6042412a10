//! On-disk state file format and rotation
//!
//! Layout: 8-byte magic, 4-byte little-endian format version, then
//! bincode(StateTree). Writes go to a sibling temp file and are renamed into
//! place. Rotation shifts `file.k -> file.k+1` before the new primary lands.

use crate::error::StoreError;
use crate::store::path::validate_segment;
use crate::store::tree::{Node, StateTree};
use bincode;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STATE_FILE_MAGIC: &[u8; 8] = b"STRATA\0\0";
const STATE_FILE_VERSION_V1: u32 = 1;
const HEADER_LEN: usize = 12;

/// Serialize a tree into the versioned file format.
pub fn encode(tree: &StateTree) -> Result<Vec<u8>, StoreError> {
    let payload = bincode::serialize(tree).map_err(|e| {
        StoreError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize state tree: {}", e),
        ))
    })?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(STATE_FILE_MAGIC);
    bytes.extend_from_slice(&STATE_FILE_VERSION_V1.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Parse the versioned file format. `path` is only used for error messages.
pub fn decode(bytes: &[u8], path: &Path) -> Result<StateTree, StoreError> {
    let corrupt = |reason: String| StoreError::CorruptFile {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < HEADER_LEN {
        return Err(corrupt("file too short".to_string()));
    }
    if &bytes[..8] != STATE_FILE_MAGIC {
        return Err(corrupt("bad magic bytes".to_string()));
    }
    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if version != STATE_FILE_VERSION_V1 {
        return Err(corrupt(format!("unsupported format version {}", version)));
    }
    let tree: StateTree = bincode::deserialize(&bytes[HEADER_LEN..])
        .map_err(|e| corrupt(format!("failed to deserialize tree: {}", e)))?;
    validate_names(tree.top_level()).map_err(corrupt)?;
    Ok(tree)
}

/// Load a tree from disk. `Ok(None)` when the file does not exist.
pub fn load_from_disk(path: &Path) -> Result<Option<StateTree>, StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "State file absent");
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|e| StoreError::CorruptFile {
        path: path.to_path_buf(),
        reason: format!("unreadable: {}", e),
    })?;
    let tree = decode(&bytes, path)?;
    debug!(path = %path.display(), leaves = tree.len(), "Loaded state file");
    Ok(Some(tree))
}

/// Write a tree to disk, rotating `rotate_n` backups first.
pub fn save_to_disk(path: &Path, tree: &StateTree, rotate_n: usize) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create parent directory {:?}: {}", parent, e),
                ))
            })?;
        }
    }

    let serialized = encode(tree)?;

    // Write the temp file before touching backups so a failed write leaves
    // the primary and its rotation intact.
    let temp_path = suffixed(path, "tmp");
    fs::write(&temp_path, &serialized).map_err(|e| {
        StoreError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to write state to {:?}: {}", temp_path, e),
        ))
    })?;

    if rotate_n > 0 {
        if let Err(e) = rotate(path, rotate_n) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StoreError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to rename temp file to {:?}: {}", path, e),
        ))
    })?;

    info!(
        path = %path.display(),
        leaves = tree.len(),
        bytes = serialized.len(),
        rotate_n,
        "Saved state file"
    );
    Ok(())
}

/// Shift existing backups up by one and move the primary to `.1`.
///
/// The backup at `.rotate_n` is discarded.
pub fn rotate(path: &Path, rotate_n: usize) -> Result<(), StoreError> {
    if rotate_n == 0 {
        return Ok(());
    }
    let oldest = backup_path(path, rotate_n);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for k in (1..rotate_n).rev() {
        let from = backup_path(path, k);
        if from.exists() {
            fs::rename(&from, backup_path(path, k + 1))?;
        }
    }
    if path.exists() {
        fs::rename(path, backup_path(path, 1))?;
        debug!(path = %path.display(), rotate_n, "Rotated state file backups");
    }
    Ok(())
}

/// Path of the k-th backup: `<file>.<k>`.
pub fn backup_path(path: &Path, k: usize) -> PathBuf {
    suffixed(path, &k.to_string())
}

/// Remove the primary file and every consecutive backup `.1`, `.2`, ...
///
/// Returns how many files were removed.
pub fn remove_with_backups(path: &Path) -> Result<usize, StoreError> {
    let mut removed = 0;
    if path.exists() {
        fs::remove_file(path)?;
        removed += 1;
    }
    let mut k = 1;
    loop {
        let backup = backup_path(path, k);
        if !backup.exists() {
            break;
        }
        fs::remove_file(&backup)?;
        removed += 1;
        k += 1;
    }
    Ok(removed)
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn validate_names(children: &BTreeMap<String, Node>) -> Result<(), String> {
    for (name, node) in children {
        validate_segment(name).map_err(|reason| format!("invalid key '{}': {}", name, reason))?;
        if let Node::Group(grand) = node {
            validate_names(grand)?;
        }
    }
    Ok(())
}
