//! Error types for fragment mutation.

use realtime_types::{FragmentId, FragmentType};
use thiserror::Error;

/// Errors that can occur while mutating the fragment tree.
///
/// Lookup misses by fragment id are *not* errors — the `*_with_id` entry
/// points return `Ok(None)` for those and callers skip the operation. The
/// variants here are structural: a batch that hits one is aborted and its
/// partial state discarded.
#[derive(Error, Debug)]
pub enum FragmentError {
    /// Parent fragment id missing from the path index where one is required.
    #[error("parent fragment not found: {0}")]
    ParentNotFound(FragmentId),

    /// Fragment id missing from the tree arena (index and tree disagree).
    #[error("fragment not found: {0}")]
    FragmentNotFound(FragmentId),

    /// A path step did not resolve to a child.
    #[error("path does not resolve: no child at step '{step}' (depth {depth})")]
    PathResolution { depth: usize, step: String },

    /// Operation addressed a slot kind the parent cannot hold
    /// (e.g. a numeric index into a map).
    #[error("invalid slot '{step}' for a {parent} parent")]
    InvalidSlot { parent: FragmentType, step: String },

    /// Map insert with neither an explicit key nor a declared map key.
    #[error("map insert requires a key")]
    MissingMapKey,

    /// Parent of a moved item must be a list.
    #[error("parent of a moved item must be a {expected}, was {actual}")]
    InvalidParentType {
        expected: FragmentType,
        actual: FragmentType,
    },

    /// The root fragment has no parent slot to operate on.
    #[error("cannot delete or move the root fragment")]
    RootMutation,

    /// A root operation must stand alone in its batch.
    #[error("cannot have more than one operation when replacing the root")]
    RootNotExclusive,

    /// A nested fragment is structurally inconsistent (e.g. a list child
    /// without a list index).
    #[error("malformed fragment {id}: {detail}")]
    MalformedFragment { id: FragmentId, detail: String },
}
