//! State tree storage
//!
//! The lock-free building blocks under [`crate::state::StateStore`]: path
//! parsing, the in-memory tree, and the on-disk format.

pub mod path;
pub mod persistence;
pub mod tree;

pub use path::{NamespacePath, SEPARATOR};
pub use tree::{Node, NodeRef, StateTree};
