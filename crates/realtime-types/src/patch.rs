//! Low-level snapshot patches and the canonical local operation stream.
//!
//! The optimistic mutation API produces a before/after snapshot pair plus a
//! list of [`LocalPatch`] records (path + op + value). Translation turns
//! those into [`LocalOperation`]s — the canonical insert/delete/move/replace
//! stream the mutation engine consumes. Patches may cross a serialization
//! boundary (an embedding UI layer), so their `op` field tolerates kinds we
//! do not know about yet; operations are internal and strongly typed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{DocPath, DocStep, DocValue};

/// Raw patch kind. Unknown kinds deserialize to [`PatchOp::Unknown`] and are
/// logged and skipped during translation rather than failing the batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
    #[serde(other)]
    Unknown,
}

/// One low-level patch record: a path into the snapshot, what happened
/// there, and the new value when one exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPatch {
    pub op: PatchOp,
    pub path: DocPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Arc<DocValue>>,
}

impl LocalPatch {
    /// Patch with a value payload.
    pub fn new(op: PatchOp, path: DocPath, value: Arc<DocValue>) -> Self {
        Self {
            op,
            path,
            value: Some(value),
        }
    }

    /// Patch without a value payload (removals).
    pub fn remove(path: DocPath) -> Self {
        Self {
            op: PatchOp::Remove,
            path,
            value: None,
        }
    }
}

/// A canonical local operation, addressed by parent path + slot.
///
/// This is the unit the mutation engine replays: list patches have already
/// been reconciled into explicit insert/delete/move/replace entries, and
/// map/scalar patches mapped one to one.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalOperation {
    /// Replace the entire document. Must be the only operation in its batch.
    Root { value: Arc<DocValue> },
    /// Insert `value` under `parent_path` at `index` (map key or list position).
    Insert {
        parent_path: DocPath,
        index: DocStep,
        value: Arc<DocValue>,
    },
    /// Delete the child of `parent_path` at `index`.
    Delete { parent_path: DocPath, index: DocStep },
    /// Replace the child of `parent_path` at `index` with `value`, keeping
    /// the slot's fragment identity.
    Replace {
        parent_path: DocPath,
        index: DocStep,
        value: Arc<DocValue>,
    },
    /// Move a list child of `list_path` from position `from` to `to`.
    Move {
        list_path: DocPath,
        from: usize,
        to: usize,
    },
}
