//! In-memory state tree
//!
//! An explicit tree of nodes with ordered child maps. A node is either a leaf
//! holding one [`Value`] or a group holding named children, never both.
//! `StateTree` carries no locking; [`crate::state::StateStore`] wraps it.

use crate::error::StoreError;
use crate::store::path::NamespacePath;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node in the state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf(Value),
    Group(BTreeMap<String, Node>),
}

/// Borrowed view of a node, including the implicit root group.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Leaf(&'a Value),
    Group(&'a BTreeMap<String, Node>),
}

/// Hierarchical key/value tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateTree {
    root: BTreeMap<String, Node>,
}

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the node at `path`. The root path always resolves to the root group.
    pub fn find(&self, path: &NamespacePath) -> Option<NodeRef<'_>> {
        let mut current = NodeRef::Group(&self.root);
        for segment in path.segments() {
            current = match current {
                NodeRef::Group(children) => match children.get(segment)? {
                    Node::Leaf(value) => NodeRef::Leaf(value),
                    Node::Group(grand) => NodeRef::Group(grand),
                },
                NodeRef::Leaf(_) => return None,
            };
        }
        Some(current)
    }

    /// Read the leaf value at `path`.
    pub fn get(&self, path: &NamespacePath) -> Result<&Value, StoreError> {
        match self.find(path) {
            Some(NodeRef::Leaf(value)) => Ok(value),
            Some(NodeRef::Group(_)) => Err(StoreError::NotALeaf(path.to_string())),
            None => Err(StoreError::KeyNotFound(path.to_string())),
        }
    }

    pub fn contains(&self, path: &NamespacePath) -> bool {
        self.find(path).is_some()
    }

    /// Create or overwrite a leaf, creating missing groups along the way.
    pub fn set(&mut self, path: &NamespacePath, value: Value) -> Result<(), StoreError> {
        let Some((last, parents)) = path.segments().split_last() else {
            return Err(StoreError::InvalidPath(
                "cannot set a value at the root".to_string(),
            ));
        };
        let children = self.group_mut(parents, true)?;
        if let Some(Node::Group(_)) = children.get(last) {
            return Err(StoreError::PathConflict(path.to_string()));
        }
        children.insert(last.clone(), Node::Leaf(value));
        Ok(())
    }

    /// Remove a leaf or a whole subtree. Deleting the root empties the tree.
    pub fn delete(&mut self, path: &NamespacePath) -> Result<Node, StoreError> {
        let Some((last, parents)) = path.segments().split_last() else {
            return Ok(Node::Group(std::mem::take(&mut self.root)));
        };
        let children = self
            .group_mut(parents, false)
            .map_err(|_| StoreError::KeyNotFound(path.to_string()))?;
        children
            .remove(last)
            .ok_or_else(|| StoreError::KeyNotFound(path.to_string()))
    }

    /// Immediate child names of the group at `path`, in order.
    pub fn children(&self, path: &NamespacePath) -> Result<Vec<String>, StoreError> {
        match self.find(path) {
            Some(NodeRef::Group(children)) => Ok(children.keys().cloned().collect()),
            Some(NodeRef::Leaf(_)) => Err(StoreError::PathConflict(path.to_string())),
            None => Err(StoreError::KeyNotFound(path.to_string())),
        }
    }

    /// Every leaf with its full path, depth-first in key order.
    pub fn leaves(&self) -> Vec<(NamespacePath, &Value)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &NamespacePath::root(), &mut out);
        out
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        count_leaves(&self.root)
    }

    /// True when the tree holds no leaves. Groups emptied by `delete` stay
    /// in place and do not count.
    pub fn is_empty(&self) -> bool {
        !has_leaves(&self.root)
    }

    /// Top-level nodes, for rendering.
    pub fn top_level(&self) -> &BTreeMap<String, Node> {
        &self.root
    }

    /// Clone the group at `path` out as its own tree.
    pub fn subtree(&self, path: &NamespacePath) -> Result<StateTree, StoreError> {
        match self.find(path) {
            Some(NodeRef::Group(children)) => Ok(StateTree {
                root: children.clone(),
            }),
            Some(NodeRef::Leaf(_)) => Err(StoreError::PathConflict(path.to_string())),
            None => Err(StoreError::KeyNotFound(path.to_string())),
        }
    }

    /// Merge `other` into the group at `path`, creating it if needed.
    ///
    /// Groups merge recursively; anywhere else the incoming node replaces
    /// the existing one.
    pub fn graft(&mut self, path: &NamespacePath, other: StateTree) -> Result<(), StoreError> {
        let target = self.group_mut(path.segments(), true)?;
        merge_groups(target, other.root);
        Ok(())
    }

    fn group_mut(
        &mut self,
        segments: &[String],
        create: bool,
    ) -> Result<&mut BTreeMap<String, Node>, StoreError> {
        let mut current = &mut self.root;
        for (depth, segment) in segments.iter().enumerate() {
            if create && !current.contains_key(segment) {
                current.insert(segment.clone(), Node::Group(BTreeMap::new()));
            }
            current = match current.get_mut(segment) {
                Some(Node::Group(children)) => children,
                Some(Node::Leaf(_)) => {
                    let conflict = NamespacePath::from_trusted(&segments[..=depth]);
                    return Err(StoreError::PathConflict(conflict.to_string()));
                }
                None => {
                    let missing = NamespacePath::from_trusted(&segments[..=depth]);
                    return Err(StoreError::KeyNotFound(missing.to_string()));
                }
            };
        }
        Ok(current)
    }
}

fn merge_groups(target: &mut BTreeMap<String, Node>, incoming: BTreeMap<String, Node>) {
    for (name, node) in incoming {
        match node {
            Node::Group(children) => {
                if let Some(Node::Group(existing)) = target.get_mut(&name) {
                    merge_groups(existing, children);
                } else {
                    target.insert(name, Node::Group(children));
                }
            }
            leaf => {
                target.insert(name, leaf);
            }
        }
    }
}

fn collect_leaves<'a>(
    children: &'a BTreeMap<String, Node>,
    prefix: &NamespacePath,
    out: &mut Vec<(NamespacePath, &'a Value)>,
) {
    for (name, node) in children {
        // names were validated on insert and on load
        let path = prefix.child_trusted(name);
        match node {
            Node::Leaf(value) => out.push((path, value)),
            Node::Group(grand) => collect_leaves(grand, &path, out),
        }
    }
}

fn count_leaves(children: &BTreeMap<String, Node>) -> usize {
    children
        .values()
        .map(|node| match node {
            Node::Leaf(_) => 1,
            Node::Group(grand) => count_leaves(grand),
        })
        .sum()
}

fn has_leaves(children: &BTreeMap<String, Node>) -> bool {
    children.values().any(|node| match node {
        Node::Leaf(_) => true,
        Node::Group(grand) => has_leaves(grand),
    })
}
