//! Outbound wire requests consumed by the transport layer.
//!
//! One request is emitted per canonical operation applied to the fragment
//! tree. A model-level replace travels as `delete` immediately followed by
//! an `insert` that reuses the deleted fragment's id, preserving identity
//! continuity for remote parties.

use serde::{Deserialize, Serialize};

use crate::{Fragment, FragmentId};

/// A document operation request, tagged by `op` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DocumentOperationRequest {
    /// Replace the entire document. Must be the only request in its batch.
    Root { value: Fragment },
    /// Insert a fragment under `parent_id`. Exactly one of `parent_map_key`
    /// / `parent_list_index` is set, matching the parent's kind.
    Insert {
        parent_id: FragmentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_map_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_list_index: Option<usize>,
        value: Fragment,
    },
    /// Delete a fragment.
    Delete { id: FragmentId, parent_id: FragmentId },
    /// Move a list child to a new position.
    Move {
        id: FragmentId,
        index: usize,
        parent_id: FragmentId,
    },
}

impl DocumentOperationRequest {
    /// The wire tag of this request.
    pub fn op_name(&self) -> &'static str {
        match self {
            DocumentOperationRequest::Root { .. } => "root",
            DocumentOperationRequest::Insert { .. } => "insert",
            DocumentOperationRequest::Delete { .. } => "delete",
            DocumentOperationRequest::Move { .. } => "move",
        }
    }
}
