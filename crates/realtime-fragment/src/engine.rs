//! Copy-on-write mutation engine over a fragment tree.
//!
//! One [`ImmutableFragment`] is constructed per batch of local operations.
//! It owns a working copy of the tree and the path index, and guarantees
//! that every node it mutates is cloned at most once for the whole batch:
//! the `cloned` set records which ids already belong to this batch, so a
//! second mutation of the same node edits the batch-private copy in place.
//! Snapshots taken before the batch keep their original `Arc`s untouched.
//!
//! Every operation returns a descriptor of what changed (ids, slots, parent
//! paths) so the caller can build wire requests without re-walking the tree.
//!
//! Operations come in two addressing flavours:
//!
//! | flavour     | addressed by                  | unknown target        |
//! |-------------|-------------------------------|-----------------------|
//! | `*_at_path` | [`DocPath`] into the snapshot | hard error            |
//! | `*_with_id` | fragment id via the index     | `Ok(None)`, skipped   |
//!
//! The id flavour tolerates misses because ids arrive from remote parties
//! and may refer to fragments that a concurrent local edit already removed.

use std::collections::HashSet;
use std::sync::Arc;

use realtime_types::{DocStep, Fragment, FragmentId, FragmentPath, FragmentType, PathStep};

use crate::diagnostics::{check_list_indexes, DiagnosticsConfig};
use crate::error::FragmentError;
use crate::index::{
    add_subtree_to_path_index, build_path_index, remove_fragment_id_to_path, FragmentIdToPath,
};
use crate::tree::{FragmentNode, FragmentTree, NodeContent, ParentSlot};
use crate::Result;

// ============================================================================
// Change descriptors
// ============================================================================

/// Result of an insert: where the new fragment landed.
#[derive(Clone, Debug)]
pub struct InsertedFragment {
    /// Id of the inserted fragment.
    pub id: FragmentId,
    /// Parent it was inserted into.
    pub parent_id: FragmentId,
    /// Slot it occupies in the parent (map key or final, clamped list index).
    pub slot: ParentSlot,
    /// Path of the parent at the time of insertion.
    pub parent_path: FragmentPath,
}

/// Result of a delete: the removed fragment and where it came from.
#[derive(Clone, Debug)]
pub struct DeletedFragment {
    /// Id of the removed fragment.
    pub id: FragmentId,
    /// Parent it was removed from.
    pub parent_id: FragmentId,
    /// Slot it occupied in the parent.
    pub slot: ParentSlot,
    /// Path of the parent at the time of removal.
    pub parent_path: FragmentPath,
    /// Nested snapshot of the removed subtree, taken before removal.
    pub fragment: Fragment,
}

/// Result of a list move.
#[derive(Clone, Debug)]
pub struct MovedFragment {
    /// Id of the moved fragment.
    pub id: FragmentId,
    /// The list fragment it moved within.
    pub parent_id: FragmentId,
    /// Path of that list.
    pub list_path: FragmentPath,
    /// Position before the move.
    pub from_index: usize,
    /// Position after the move (clamped to the list length).
    pub to_index: usize,
}

/// Result of a slot replacement.
#[derive(Clone, Debug)]
pub struct ReplacedFragment {
    /// Parent whose slot was swapped.
    pub parent_id: FragmentId,
    /// Id of the fragment now occupying the slot.
    pub id: FragmentId,
}

// ============================================================================
// Engine
// ============================================================================

/// Per-batch copy-on-write view of a fragment tree and its path index.
pub struct ImmutableFragment {
    tree: FragmentTree,
    index: FragmentIdToPath,
    /// Ids already cloned into this batch; mutating them again is safe.
    cloned: HashSet<FragmentId>,
    diagnostics: DiagnosticsConfig,
}

impl ImmutableFragment {
    /// Start a batch over an existing tree and index.
    pub fn new(tree: FragmentTree, index: FragmentIdToPath) -> Self {
        Self::with_diagnostics(tree, index, DiagnosticsConfig::default())
    }

    /// Start a batch with explicit diagnostics settings.
    pub fn with_diagnostics(
        tree: FragmentTree,
        index: FragmentIdToPath,
        diagnostics: DiagnosticsConfig,
    ) -> Self {
        Self {
            tree,
            index,
            cloned: HashSet::new(),
            diagnostics,
        }
    }

    /// Build a batch directly from a nested fragment (index built fresh).
    pub fn from_fragment(fragment: &Fragment) -> Result<Self> {
        let tree = FragmentTree::from_fragment(fragment)?;
        let index = build_path_index(&tree);
        Ok(Self::new(tree, index))
    }

    /// The batch's current tree.
    pub fn tree(&self) -> &FragmentTree {
        &self.tree
    }

    /// The batch's current path index.
    pub fn path_index(&self) -> &FragmentIdToPath {
        &self.index
    }

    /// Nested snapshot of the batch's current root fragment.
    pub fn fragment(&self) -> Fragment {
        self.tree.snapshot_root()
    }

    /// Finish the batch, yielding the new tree and index.
    pub fn into_parts(self) -> (FragmentTree, FragmentIdToPath) {
        (self.tree, self.index)
    }

    // ------------------------------------------------------------------
    // Copy-on-write plumbing
    // ------------------------------------------------------------------

    /// Clone `id`'s node into the batch unless this batch already owns it.
    fn touch(&mut self, id: FragmentId) {
        if self.cloned.insert(id) {
            if let Some(node) = self.tree.node(id) {
                let fresh = Arc::new(FragmentNode::clone(node));
                self.tree.put(fresh);
            }
        }
    }

    /// Resolve a fragment path from the root, cloning every node along the
    /// way into the batch (root included).
    fn resolve_path_mut(&mut self, path: &FragmentPath) -> Result<FragmentId> {
        let mut current = self.tree.root_id();
        self.touch(current);
        for (depth, step) in path.iter().enumerate() {
            let node = self
                .tree
                .node(current)
                .ok_or(FragmentError::FragmentNotFound(current))?;
            let child =
                self.tree
                    .child_id_at(node, step)
                    .ok_or_else(|| FragmentError::PathResolution {
                        depth,
                        step: step.to_string(),
                    })?;
            self.touch(child);
            current = child;
        }
        Ok(current)
    }

    /// Translate a document path (keys and positions) into a fragment path
    /// (keys and ids). Read-only.
    pub fn fragment_path_from_doc_path(&self, doc_path: &[DocStep]) -> Result<FragmentPath> {
        let mut path = FragmentPath::with_capacity(doc_path.len());
        let mut current = self.tree.root_id();
        for (depth, doc_step) in doc_path.iter().enumerate() {
            let node = self
                .tree
                .node(current)
                .ok_or(FragmentError::FragmentNotFound(current))?;
            let step = match (&node.content, doc_step) {
                (NodeContent::List(_), DocStep::Index(index)) => {
                    let child = self.tree.list_child_with_index(node, *index).ok_or_else(|| {
                        FragmentError::PathResolution {
                            depth,
                            step: doc_step.to_string(),
                        }
                    })?;
                    PathStep::Id(child)
                }
                (NodeContent::Map(_), DocStep::Key(key)) => PathStep::Key(key.clone()),
                _ => {
                    return Err(FragmentError::InvalidSlot {
                        parent: node.fragment_type(),
                        step: doc_step.to_string(),
                    })
                }
            };
            current =
                self.tree
                    .child_id_at(node, &step)
                    .ok_or_else(|| FragmentError::PathResolution {
                        depth,
                        step: doc_step.to_string(),
                    })?;
            path.push(step);
        }
        Ok(path)
    }

    /// Resolve a fragment and its parent, cloning both paths into the batch.
    /// The root has no parent and cannot be the target.
    fn resolve_with_parent(
        &mut self,
        path: &FragmentPath,
    ) -> Result<(FragmentId, FragmentId, FragmentPath)> {
        let id = self.resolve_path_mut(path)?;
        let node = self
            .tree
            .node(id)
            .ok_or(FragmentError::FragmentNotFound(id))?;
        let parent_id = node.parent_id.ok_or(FragmentError::RootMutation)?;
        let parent_path = self
            .index
            .get(&parent_id)
            .cloned()
            .ok_or(FragmentError::ParentNotFound(parent_id))?;
        self.resolve_path_mut(&parent_path)?;
        Ok((id, parent_id, parent_path))
    }

    /// `(id, index)` of every child of a list node.
    fn list_entries(&self, list_id: FragmentId) -> Vec<(FragmentId, usize)> {
        let Some(node) = self.tree.node(list_id) else {
            return Vec::new();
        };
        let NodeContent::List(children) = &node.content else {
            return Vec::new();
        };
        children
            .iter()
            .filter_map(|id| {
                let index = self.tree.node(*id)?.parent_list_index()?;
                Some((*id, index))
            })
            .collect()
    }

    /// Drop the whole subtree rooted at `id` from the arena and the index.
    fn remove_subtree(&mut self, id: FragmentId) {
        for subtree_id in self.tree.subtree_ids(id) {
            self.tree.remove(subtree_id);
            remove_fragment_id_to_path(&mut self.index, subtree_id);
            self.cloned.remove(&subtree_id);
        }
    }

    fn debug_list(&self, list_id: FragmentId, stage: &str) {
        if self.diagnostics.check_list_indexes {
            if let Some(node) = self.tree.node(list_id) {
                check_list_indexes(&self.tree, node, stage);
            }
        }
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Insert a nested fragment under the parent at `parent_path`, at the
    /// map key or list position `slot`.
    pub fn insert_at_path(
        &mut self,
        fragment: Fragment,
        parent_path: &[DocStep],
        slot: &DocStep,
    ) -> Result<InsertedFragment> {
        let parent_fragment_path = self.fragment_path_from_doc_path(parent_path)?;
        self.insert_fragment(fragment, parent_fragment_path, Some(slot))
    }

    /// Insert a nested fragment under the parent with the given id, at the
    /// slot declared by the fragment's own parent fields. Returns `Ok(None)`
    /// when the parent id is unknown.
    pub fn insert_with_id(
        &mut self,
        fragment: Fragment,
        parent_id: FragmentId,
    ) -> Result<Option<InsertedFragment>> {
        let Some(parent_path) = self.index.get(&parent_id).cloned() else {
            return Ok(None);
        };
        self.insert_fragment(fragment, parent_path, None).map(Some)
    }

    fn insert_fragment(
        &mut self,
        fragment: Fragment,
        parent_path: FragmentPath,
        slot: Option<&DocStep>,
    ) -> Result<InsertedFragment> {
        let parent_id = self.resolve_path_mut(&parent_path)?;
        let parent = self
            .tree
            .node(parent_id)
            .ok_or(FragmentError::FragmentNotFound(parent_id))?;

        match parent.fragment_type() {
            FragmentType::List => {
                self.insert_into_list(fragment, parent_id, parent_path, slot)
            }
            FragmentType::Map => self.insert_into_map(fragment, parent_id, parent_path, slot),
            FragmentType::Register => Err(FragmentError::InvalidSlot {
                parent: FragmentType::Register,
                step: slot.map(ToString::to_string).unwrap_or_default(),
            }),
        }
    }

    fn insert_into_list(
        &mut self,
        fragment: Fragment,
        parent_id: FragmentId,
        parent_path: FragmentPath,
        slot: Option<&DocStep>,
    ) -> Result<InsertedFragment> {
        let id = fragment.id;
        let entries = self.list_entries(parent_id);

        // A child with the same id means this insert replaces it in place
        // and inherits its position; otherwise the requested (or declared)
        // position wins, clamped to the list length.
        let replaced = entries.iter().find(|(child, _)| *child == id).copied();
        let desired = match (replaced, slot) {
            (Some((_, old_index)), _) => old_index,
            (None, Some(step)) => step.as_index().ok_or_else(|| FragmentError::InvalidSlot {
                parent: FragmentType::List,
                step: step.to_string(),
            })?,
            (None, None) => {
                fragment
                    .parent_list_index
                    .ok_or(FragmentError::MalformedFragment {
                        id,
                        detail: "list insert without a list index".to_string(),
                    })?
            }
        };
        let added_index = desired.min(entries.len());

        self.debug_list(parent_id, "about to insert");

        if let Some((old_id, _)) = replaced {
            self.remove_subtree(old_id);
        } else {
            for (child_id, child_index) in entries {
                if child_index >= added_index {
                    self.touch(child_id);
                    if let Some(node) = self.tree.node_mut(child_id) {
                        node.slot = Some(ParentSlot::ListIndex(child_index + 1));
                    }
                }
            }
        }

        let slot = ParentSlot::ListIndex(added_index);
        self.tree.insert_subtree(&fragment, parent_id, slot.clone())?;
        if let Some(node) = self.tree.node_mut(parent_id) {
            if let NodeContent::List(children) = &mut node.content {
                children.insert(id);
            }
        }

        let mut path = parent_path.clone();
        path.push(PathStep::Id(id));
        add_subtree_to_path_index(&mut self.index, &self.tree, id, path);
        // The inserted subtree is batch-fresh; later operations in the same
        // batch may mutate it in place.
        self.cloned.insert(id);

        self.debug_list(parent_id, "inserted");

        Ok(InsertedFragment {
            id,
            parent_id,
            slot,
            parent_path,
        })
    }

    fn insert_into_map(
        &mut self,
        fragment: Fragment,
        parent_id: FragmentId,
        parent_path: FragmentPath,
        slot: Option<&DocStep>,
    ) -> Result<InsertedFragment> {
        let id = fragment.id;
        let key = match slot {
            Some(step) => step
                .as_key()
                .ok_or_else(|| FragmentError::InvalidSlot {
                    parent: FragmentType::Map,
                    step: step.to_string(),
                })?
                .to_string(),
            None => fragment
                .parent_map_key
                .clone()
                .ok_or(FragmentError::MissingMapKey)?,
        };

        // Replacing an existing value under the same key drops its subtree.
        let occupant = self.tree.node(parent_id).and_then(|node| {
            self.tree
                .child_id_at(node, &PathStep::Key(key.clone()))
        });
        if let Some(old_id) = occupant {
            self.remove_subtree(old_id);
        }

        let slot = ParentSlot::MapKey(key.clone());
        self.tree.insert_subtree(&fragment, parent_id, slot.clone())?;
        if let Some(node) = self.tree.node_mut(parent_id) {
            if let NodeContent::Map(children) = &mut node.content {
                children.insert(key.clone(), id);
            }
        }

        let mut path = parent_path.clone();
        path.push(PathStep::Key(key));
        add_subtree_to_path_index(&mut self.index, &self.tree, id, path);
        self.cloned.insert(id);

        Ok(InsertedFragment {
            id,
            parent_id,
            slot,
            parent_path,
        })
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete the fragment at `doc_path`.
    pub fn delete_at_path(&mut self, doc_path: &[DocStep]) -> Result<DeletedFragment> {
        let path = self.fragment_path_from_doc_path(doc_path)?;
        self.delete_fragment(path)
    }

    /// Delete the fragment with the given id. Returns `Ok(None)` when the id
    /// is unknown.
    pub fn delete_with_id(&mut self, id: FragmentId) -> Result<Option<DeletedFragment>> {
        let Some(path) = self.index.get(&id).cloned() else {
            return Ok(None);
        };
        self.delete_fragment(path).map(Some)
    }

    fn delete_fragment(&mut self, path: FragmentPath) -> Result<DeletedFragment> {
        let (id, parent_id, parent_path) = self.resolve_with_parent(&path)?;
        let node = self
            .tree
            .node(id)
            .ok_or(FragmentError::FragmentNotFound(id))?;
        let slot = node.slot.clone().ok_or(FragmentError::RootMutation)?;
        let snapshot = self
            .tree
            .snapshot(id)
            .ok_or(FragmentError::FragmentNotFound(id))?;

        match &slot {
            ParentSlot::ListIndex(removed_index) => {
                let removed_index = *removed_index;
                self.debug_list(parent_id, "about to delete");
                self.remove_subtree(id);
                if let Some(parent) = self.tree.node_mut(parent_id) {
                    if let NodeContent::List(children) = &mut parent.content {
                        children.remove(&id);
                    }
                }
                for (child_id, child_index) in self.list_entries(parent_id) {
                    if child_index > removed_index {
                        self.touch(child_id);
                        if let Some(child) = self.tree.node_mut(child_id) {
                            child.slot = Some(ParentSlot::ListIndex(child_index - 1));
                        }
                    }
                }
                self.debug_list(parent_id, "deleted");
            }
            ParentSlot::MapKey(key) => {
                let key = key.clone();
                self.remove_subtree(id);
                if let Some(parent) = self.tree.node_mut(parent_id) {
                    if let NodeContent::Map(children) = &mut parent.content {
                        children.remove(&key);
                    }
                }
            }
        }

        Ok(DeletedFragment {
            id,
            parent_id,
            slot,
            parent_path,
            fragment: snapshot,
        })
    }

    // ------------------------------------------------------------------
    // Move
    // ------------------------------------------------------------------

    /// Move the item at `from` to `to` within the list at `list_path`.
    pub fn move_index_at_path(
        &mut self,
        list_path: &[DocStep],
        from: usize,
        to: usize,
    ) -> Result<MovedFragment> {
        let mut doc_path = list_path.to_vec();
        doc_path.push(DocStep::Index(from));
        let path = self.fragment_path_from_doc_path(&doc_path)?;
        self.move_fragment(path, to)
    }

    /// Move the fragment with the given id to position `to` within its list
    /// parent. Returns `Ok(None)` when the id is unknown.
    pub fn move_index_with_id(
        &mut self,
        id: FragmentId,
        to: usize,
    ) -> Result<Option<MovedFragment>> {
        let Some(path) = self.index.get(&id).cloned() else {
            return Ok(None);
        };
        self.move_fragment(path, to).map(Some)
    }

    fn move_fragment(&mut self, path: FragmentPath, to: usize) -> Result<MovedFragment> {
        let (id, parent_id, list_path) = self.resolve_with_parent(&path)?;
        let parent = self
            .tree
            .node(parent_id)
            .ok_or(FragmentError::FragmentNotFound(parent_id))?;
        if parent.fragment_type() != FragmentType::List {
            return Err(FragmentError::InvalidParentType {
                expected: FragmentType::List,
                actual: parent.fragment_type(),
            });
        }

        let node = self
            .tree
            .node(id)
            .ok_or(FragmentError::FragmentNotFound(id))?;
        let from = node
            .parent_list_index()
            .ok_or(FragmentError::MalformedFragment {
                id,
                detail: "list child without a list index".to_string(),
            })?;

        let entries = self.list_entries(parent_id);
        let to = to.min(entries.len().saturating_sub(1));

        self.debug_list(parent_id, "about to move");

        if from < to {
            // Moving right: everything in (from, to] shifts one left.
            for (child_id, child_index) in entries {
                let shifted = if child_index > from && child_index <= to {
                    Some(child_index - 1)
                } else if child_index == from {
                    Some(to)
                } else {
                    None
                };
                if let Some(new_index) = shifted {
                    self.touch(child_id);
                    if let Some(child) = self.tree.node_mut(child_id) {
                        child.slot = Some(ParentSlot::ListIndex(new_index));
                    }
                }
            }
        } else if from > to {
            // Moving left: everything in [to, from) shifts one right.
            for (child_id, child_index) in entries {
                let shifted = if child_index >= to && child_index < from {
                    Some(child_index + 1)
                } else if child_index == from {
                    Some(to)
                } else {
                    None
                };
                if let Some(new_index) = shifted {
                    self.touch(child_id);
                    if let Some(child) = self.tree.node_mut(child_id) {
                        child.slot = Some(ParentSlot::ListIndex(new_index));
                    }
                }
            }
        }

        self.debug_list(parent_id, "moved");

        Ok(MovedFragment {
            id,
            parent_id,
            list_path,
            from_index: from,
            to_index: to,
        })
    }

    // ------------------------------------------------------------------
    // Replace
    // ------------------------------------------------------------------

    /// Swap the slot occupied by `old_id` for `fragment`, registering the
    /// new subtree under `new_path`. The new subtree is *not* marked as
    /// batch-owned: later operations in the same batch clone it first, so
    /// the swapped-in value stays exactly what the caller provided.
    pub fn replace_fragment(
        &mut self,
        old_id: FragmentId,
        fragment: Fragment,
        new_path: FragmentPath,
        parent_id: FragmentId,
    ) -> Result<ReplacedFragment> {
        let parent_path = self
            .index
            .get(&parent_id)
            .cloned()
            .ok_or(FragmentError::ParentNotFound(parent_id))?;
        self.resolve_path_mut(&parent_path)?;

        let old = self
            .tree
            .node(old_id)
            .ok_or(FragmentError::FragmentNotFound(old_id))?;
        let slot = old.slot.clone().ok_or(FragmentError::RootMutation)?;

        let id = fragment.id;
        self.remove_subtree(old_id);
        self.tree.insert_subtree(&fragment, parent_id, slot.clone())?;
        if let Some(parent) = self.tree.node_mut(parent_id) {
            match (&mut parent.content, &slot) {
                (NodeContent::List(children), ParentSlot::ListIndex(_)) => {
                    // The replacement may carry a fresh id; drop the old
                    // entry so the slot is not double-booked.
                    children.remove(&old_id);
                    children.insert(id);
                }
                (NodeContent::Map(children), ParentSlot::MapKey(key)) => {
                    children.insert(key.clone(), id);
                }
                _ => {}
            }
        }
        add_subtree_to_path_index(&mut self.index, &self.tree, id, new_path);

        Ok(ReplacedFragment { parent_id, id })
    }
}
