//! Path addressing for fragments and document snapshots.
//!
//! Two path forms exist and must not be confused:
//!
//! - [`FragmentPath`] — the slot keys from root to a fragment: map children
//!   are addressed by map key, list children by their *fragment id*. This is
//!   what the path index stores; it stays valid across list reorders.
//! - [`DocPath`] — raw keys and numeric indices as produced by the
//!   snapshot-diffing mutation API. List children are addressed by position,
//!   so these paths are only meaningful against one specific snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::FragmentId;

/// One step of a [`FragmentPath`]: the slot key under which a child is
/// stored in its parent.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum PathStep {
    /// Map child, addressed by map key.
    Key(String),
    /// List child, addressed by fragment id.
    Id(FragmentId),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(key) => write!(f, "{key}"),
            PathStep::Id(id) => write!(f, "{}", id.short()),
        }
    }
}

/// Ordered slot keys from root to a fragment. Empty for the root itself.
pub type FragmentPath = Vec<PathStep>;

/// One step of a [`DocPath`]: a raw map key or list position.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocStep {
    /// List child, addressed by zero-based position.
    Index(usize),
    /// Map child, addressed by key.
    Key(String),
}

impl DocStep {
    /// The position, if this step addresses a list child.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            DocStep::Index(i) => Some(*i),
            DocStep::Key(_) => None,
        }
    }

    /// The key, if this step addresses a map child.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            DocStep::Index(_) => None,
            DocStep::Key(k) => Some(k),
        }
    }
}

impl fmt::Display for DocStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocStep::Index(i) => write!(f, "{i}"),
            DocStep::Key(k) => write!(f, "{k}"),
        }
    }
}

impl From<usize> for DocStep {
    fn from(i: usize) -> Self {
        DocStep::Index(i)
    }
}

impl From<&str> for DocStep {
    fn from(k: &str) -> Self {
        DocStep::Key(k.to_string())
    }
}

impl From<String> for DocStep {
    fn from(k: String) -> Self {
        DocStep::Key(k)
    }
}

/// Raw key/index path into a document snapshot. Empty for the root.
pub type DocPath = Vec<DocStep>;
