//! Translation between raw snapshot patches, canonical operations, and wire
//! requests.
//!
//! Two stages:
//!
//! 1. [`local_patches_to_operations`] — fold the raw patch stream into
//!    canonical [`LocalOperation`]s. Patches under a list parent are grouped
//!    per list and handed to the reconciler; map and scalar patches map one
//!    to one; a patch with an empty path replaces the whole document.
//! 2. [`apply_operations_to_fragment`] — replay the operations against a
//!    copy-on-write batch, producing the next tree + index pair and one wire
//!    request per operation (a `replace` expands to delete + insert reusing
//!    the deleted fragment's id).

use std::sync::Arc;

use tracing::warn;

use realtime_types::{
    DocValue, DocumentOperationRequest, Fragment, LocalOperation, LocalPatch, PatchOp,
};

use crate::convert::{fragment_from_doc, fragment_from_doc_with_id};
use crate::engine::ImmutableFragment;
use crate::error::FragmentError;
use crate::index::{build_path_index, FragmentIdToPath};
use crate::tree::FragmentTree;
use crate::Result;

/// Output of a fully applied batch: the next published state plus the
/// requests to hand to the transport.
#[derive(Debug)]
pub struct AppliedOperations {
    pub tree: FragmentTree,
    pub index: FragmentIdToPath,
    pub requests: Vec<DocumentOperationRequest>,
}

/// Fold raw patches into canonical operations.
///
/// `old_doc` and `new_doc` are the snapshots the patches were produced
/// between; unchanged subtrees must be pointer-shared between them (the
/// reconciler matches list elements by identity).
pub fn local_patches_to_operations(
    patches: &[LocalPatch],
    old_doc: &Arc<DocValue>,
    new_doc: &Arc<DocValue>,
) -> Vec<LocalOperation> {
    let mut operations = Vec::new();
    let mut index = 0;

    while index < patches.len() {
        let patch = &patches[index];

        // An empty path replaces the whole document.
        let Some((slot, parent_path)) = patch.path.split_last() else {
            if let Some(value) = &patch.value {
                operations.push(LocalOperation::Root {
                    value: Arc::clone(value),
                });
            }
            index += 1;
            continue;
        };

        // Patches under a list parent are reconciled per list, consuming
        // every consecutive patch addressing a sibling slot of that list.
        let new_parent = new_doc.get_path(parent_path);
        if let Some(new_parent) = new_parent.filter(|parent| parent.is_list()) {
            let depth = patch.path.len();
            let mut end = index + 1;
            while end < patches.len()
                && patches[end].path.len() == depth
                && patches[end].path[..depth - 1] == *parent_path
            {
                end += 1;
            }
            let list_patches = &patches[index..end];
            index = end;

            let old_items = old_doc
                .get_path(parent_path)
                .and_then(|parent| parent.as_list())
                .unwrap_or(&[]);
            let new_items = new_parent.as_list().unwrap_or(&[]);
            operations.extend(crate::reconcile::reconcile_list(
                parent_path,
                list_patches,
                old_items,
                new_items,
            ));
            continue;
        }

        match (patch.op, &patch.value) {
            (PatchOp::Replace, Some(value)) => operations.push(LocalOperation::Replace {
                parent_path: parent_path.to_vec(),
                index: slot.clone(),
                value: Arc::clone(value),
            }),
            (PatchOp::Add, Some(value)) => operations.push(LocalOperation::Insert {
                parent_path: parent_path.to_vec(),
                index: slot.clone(),
                value: Arc::clone(value),
            }),
            (PatchOp::Remove, _) => operations.push(LocalOperation::Delete {
                parent_path: parent_path.to_vec(),
                index: slot.clone(),
            }),
            (op, _) => {
                warn!(?op, "skipping unhandled patch kind");
            }
        }
        index += 1;
    }
    operations
}

/// Replay canonical operations against a batch over `tree` + `index`,
/// returning the next state and the wire requests describing it.
///
/// A `root` operation must be alone in its batch; structural failures abort
/// the whole batch and the caller keeps its previous state.
pub fn apply_operations_to_fragment(
    tree: FragmentTree,
    index: FragmentIdToPath,
    operations: &[LocalOperation],
) -> Result<AppliedOperations> {
    let mut requests = Vec::with_capacity(operations.len());
    let mut engine = ImmutableFragment::new(tree, index);

    for operation in operations {
        match operation {
            LocalOperation::Root { value } => {
                if operations.len() > 1 {
                    return Err(FragmentError::RootNotExclusive);
                }
                let fragment = fragment_from_doc(value);
                let tree = FragmentTree::from_fragment(&fragment)?;
                let index = build_path_index(&tree);
                engine = ImmutableFragment::new(tree, index);
                requests.push(DocumentOperationRequest::Root { value: fragment });
                break;
            }
            LocalOperation::Insert {
                parent_path,
                index,
                value,
            } => {
                let inserted =
                    engine.insert_at_path(fragment_from_doc(value), parent_path, index)?;
                requests.push(insert_request(&engine, &inserted)?);
            }
            LocalOperation::Delete { parent_path, index } => {
                let mut path = parent_path.clone();
                path.push(index.clone());
                let deleted = engine.delete_at_path(&path)?;
                requests.push(DocumentOperationRequest::Delete {
                    id: deleted.id,
                    parent_id: deleted.parent_id,
                });
            }
            LocalOperation::Replace {
                parent_path,
                index,
                value,
            } => {
                // A replace goes out as delete + insert; the insert reuses
                // the deleted fragment's id so the slot keeps its identity.
                let mut path = parent_path.clone();
                path.push(index.clone());
                let deleted = engine.delete_at_path(&path)?;
                requests.push(DocumentOperationRequest::Delete {
                    id: deleted.id,
                    parent_id: deleted.parent_id,
                });

                let replacement = fragment_from_doc_with_id(value, deleted.id);
                let inserted = engine.insert_at_path(replacement, parent_path, index)?;
                requests.push(insert_request(&engine, &inserted)?);
            }
            LocalOperation::Move {
                list_path,
                from,
                to,
            } => {
                let moved = engine.move_index_at_path(list_path, *from, *to)?;
                requests.push(DocumentOperationRequest::Move {
                    id: moved.id,
                    index: moved.to_index,
                    parent_id: moved.parent_id,
                });
            }
        }
    }

    let (tree, index) = engine.into_parts();
    Ok(AppliedOperations {
        tree,
        index,
        requests,
    })
}

/// Wire request for a just-inserted fragment, snapshotted with its final
/// parent links and (clamped) slot.
fn insert_request(
    engine: &ImmutableFragment,
    inserted: &crate::engine::InsertedFragment,
) -> Result<DocumentOperationRequest> {
    let value: Fragment = engine
        .tree()
        .snapshot(inserted.id)
        .ok_or(FragmentError::FragmentNotFound(inserted.id))?;
    Ok(DocumentOperationRequest::Insert {
        parent_id: inserted.parent_id,
        parent_map_key: inserted.slot.as_map_key().map(str::to_string),
        parent_list_index: inserted.slot.as_list_index(),
        value,
    })
}
