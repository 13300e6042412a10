//! Namespace path parsing and composition
//!
//! Paths are dot-separated identifier segments, e.g. `replicates.3.result`.
//! The empty string is the root.

use crate::error::StoreError;
use std::fmt;

/// Segment separator.
pub const SEPARATOR: char = '.';

/// A validated path into the state tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacePath {
    segments: Vec<String>,
}

impl NamespacePath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted string. Surrounding whitespace is ignored; an empty
    /// string is the root.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for part in input.split(SEPARATOR) {
            validate_segment(part).map_err(|reason| {
                StoreError::InvalidPath(format!("'{}': {}", input, reason))
            })?;
            segments.push(part.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::root();
        for segment in segments {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    /// Append one segment.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, StoreError> {
        let segment = segment.into();
        validate_segment(&segment)
            .map_err(|reason| StoreError::InvalidPath(format!("'{}': {}", segment, reason)))?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Concatenate two paths.
    pub fn join(&self, other: &NamespacePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Child path for a replicate index. Indices are always valid segments.
    pub fn indexed(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(index.to_string());
        Self { segments }
    }

    /// Build from segments already known to be valid (taken from a tree).
    pub(crate) fn from_trusted(segments: &[String]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }

    pub(crate) fn child_trusted(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn starts_with(&self, prefix: &NamespacePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{}", SEPARATOR)?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for NamespacePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub(crate) fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("segments may only contain ASCII letters, digits, '_' and '-'");
    }
    Ok(())
}

/// Replicate index named by `segment`, if it is the canonical decimal form
/// produced by [`NamespacePath::indexed`]. `"007"` and `"+7"` are not indices.
pub fn parse_index(segment: &str) -> Option<usize> {
    segment
        .parse::<usize>()
        .ok()
        .filter(|index| index.to_string() == segment)
}
