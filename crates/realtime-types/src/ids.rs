//! Typed identifier for fragments.
//!
//! Fragment ids wrap UUIDv4: opaque, globally unique, assigned once at
//! creation and never reused. They display as standard UUID text for logging.
//! The `short()` form (first 8 hex chars) is for human-facing output only —
//! never used as a lookup key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A fragment identifier (UUIDv4).
///
/// Identity is the backbone of the fragment model: the path index, the
/// copy-on-write clone tracking, and wire requests all key on this value.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(uuid::Uuid);

impl FragmentId {
    /// Create a new random id (UUIDv4).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// First 8 hex characters — for human display only, not lookup.
    pub fn short(&self) -> String {
        self.0.as_simple().to_string()[..8].to_string()
    }

    /// Parse from standard UUID text (with or without hyphens).
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self)
    }

    /// A nil / zero id — for sentinel values only.
    pub fn nil() -> Self {
        Self(uuid::Uuid::nil())
    }

    /// Check if this is the nil id.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for FragmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for FragmentId {
    fn from(u: uuid::Uuid) -> Self {
        Self(u)
    }
}

impl From<FragmentId> for uuid::Uuid {
    fn from(id: FragmentId) -> uuid::Uuid {
        id.0
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FragmentId({})", self.short())
    }
}
