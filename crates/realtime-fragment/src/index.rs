//! The id → path index.
//!
//! Maps every fragment id to the slot-key path from the root to that
//! fragment. The index is patched incrementally on every structural change;
//! staleness is a correctness bug, not a tolerated inconsistency: for every
//! id present, resolving its path against the tree must yield a fragment
//! with that id.
//!
//! The two single-entry helpers mirror the narrow contract of the engine's
//! bookkeeping: they touch exactly one id. Whole-subtree registration and
//! removal (the descendant cascade on insert/delete) is layered on top and
//! driven by the engine, which has the subtree in hand.

use std::collections::HashMap;

use realtime_types::{FragmentId, FragmentPath, PathStep};

use crate::tree::{FragmentTree, NodeContent};

/// Lookup table from fragment id to its path from the root.
pub type FragmentIdToPath = HashMap<FragmentId, FragmentPath>;

/// Register a single id ↦ path entry: the parent's path extended by `step`.
pub fn add_fragment_id_to_path(
    index: &mut FragmentIdToPath,
    id: FragmentId,
    parent_path: &FragmentPath,
    step: PathStep,
) {
    let mut path = parent_path.clone();
    path.push(step);
    index.insert(id, path);
}

/// Remove a single id ↦ path entry.
pub fn remove_fragment_id_to_path(index: &mut FragmentIdToPath, id: FragmentId) {
    index.remove(&id);
}

/// Register the whole subtree rooted at `id`, whose own path is `path`.
pub fn add_subtree_to_path_index(
    index: &mut FragmentIdToPath,
    tree: &FragmentTree,
    id: FragmentId,
    path: FragmentPath,
) {
    index.insert(id, path.clone());
    let Some(node) = tree.node(id) else {
        return;
    };
    match &node.content {
        NodeContent::Map(children) => {
            for (key, child_id) in children {
                let mut child_path = path.clone();
                child_path.push(PathStep::Key(key.clone()));
                add_subtree_to_path_index(index, tree, *child_id, child_path);
            }
        }
        NodeContent::List(children) => {
            for child_id in children {
                let mut child_path = path.clone();
                child_path.push(PathStep::Id(*child_id));
                add_subtree_to_path_index(index, tree, *child_id, child_path);
            }
        }
        NodeContent::Register(_) => {}
    }
}

/// Build a fresh index for an entire tree (root ↦ empty path).
pub fn build_path_index(tree: &FragmentTree) -> FragmentIdToPath {
    let mut index = FragmentIdToPath::new();
    add_subtree_to_path_index(&mut index, tree, tree.root_id(), FragmentPath::new());
    index
}
