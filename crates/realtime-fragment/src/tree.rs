//! Arena-backed fragment tree.
//!
//! Fragments live in a flat arena keyed by id; parent/child relationships
//! are id references, never owning pointers. Nodes are wrapped in `Arc` so
//! that cloning a tree is a shallow operation and two snapshots share every
//! node that neither has touched. The copy-on-write discipline itself (clone
//! a node at most once per batch) lives in the mutation engine — this module
//! only provides the storage and the nested⇄arena conversions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use realtime_types::{Fragment, FragmentContent, FragmentId, FragmentPath, FragmentType, PathStep};

use crate::error::FragmentError;
use crate::Result;

/// The slot a fragment occupies in its parent. Exactly one form applies,
/// matching the parent's kind; the root has no slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParentSlot {
    /// Stored under this key in a map parent.
    MapKey(String),
    /// Zero-based position in a list parent.
    ListIndex(usize),
}

impl ParentSlot {
    /// The map key, if this is a map slot.
    pub fn as_map_key(&self) -> Option<&str> {
        match self {
            ParentSlot::MapKey(key) => Some(key),
            ParentSlot::ListIndex(_) => None,
        }
    }

    /// The list position, if this is a list slot.
    pub fn as_list_index(&self) -> Option<usize> {
        match self {
            ParentSlot::MapKey(_) => None,
            ParentSlot::ListIndex(index) => Some(*index),
        }
    }
}

/// Kind-specific payload of an arena node. Children are id references;
/// list ordering lives on each child's slot, not here.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeContent {
    Map(HashMap<String, FragmentId>),
    List(HashSet<FragmentId>),
    Register(serde_json::Value),
}

impl NodeContent {
    /// The structural kind of this payload.
    pub fn fragment_type(&self) -> FragmentType {
        match self {
            NodeContent::Map(_) => FragmentType::Map,
            NodeContent::List(_) => FragmentType::List,
            NodeContent::Register(_) => FragmentType::Register,
        }
    }

    /// Number of direct children (0 for registers).
    pub fn child_count(&self) -> usize {
        match self {
            NodeContent::Map(children) => children.len(),
            NodeContent::List(children) => children.len(),
            NodeContent::Register(_) => 0,
        }
    }
}

/// One fragment in the arena.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentNode {
    pub id: FragmentId,
    /// Owning fragment; `None` only for the root.
    pub parent_id: Option<FragmentId>,
    /// Slot in the parent; `None` only for the root.
    pub slot: Option<ParentSlot>,
    pub content: NodeContent,
}

impl FragmentNode {
    /// The structural kind of this node.
    pub fn fragment_type(&self) -> FragmentType {
        self.content.fragment_type()
    }

    /// The list position of this node, if it sits in a list parent.
    pub fn parent_list_index(&self) -> Option<usize> {
        self.slot.as_ref().and_then(ParentSlot::as_list_index)
    }

    /// The map key of this node, if it sits in a map parent.
    pub fn parent_map_key(&self) -> Option<&str> {
        self.slot.as_ref().and_then(ParentSlot::as_map_key)
    }

    /// How this node is addressed in a fragment path: map children by key,
    /// list children by their own id.
    pub fn path_step(&self) -> Option<PathStep> {
        match self.slot.as_ref()? {
            ParentSlot::MapKey(key) => Some(PathStep::Key(key.clone())),
            ParentSlot::ListIndex(_) => Some(PathStep::Id(self.id)),
        }
    }
}

/// Flat arena of fragments plus the root id.
///
/// Cloning is shallow (`Arc` bumps per node); a clone shares every node
/// with the original until the mutation engine copies one on first write.
#[derive(Clone, Debug)]
pub struct FragmentTree {
    root: FragmentId,
    nodes: HashMap<FragmentId, Arc<FragmentNode>>,
}

impl FragmentTree {
    /// Flatten a nested fragment into an arena. The input's own parent
    /// fields are ignored at the root (it becomes this tree's root); child
    /// slots are rebuilt from the nesting structure.
    pub fn from_fragment(fragment: &Fragment) -> Result<Self> {
        let mut nodes = HashMap::new();
        flatten(fragment, None, None, &mut nodes)?;
        Ok(Self {
            root: fragment.id,
            nodes,
        })
    }

    /// The root fragment's id.
    pub fn root_id(&self) -> FragmentId {
        self.root
    }

    /// Look up a node by id.
    pub fn node(&self, id: FragmentId) -> Option<&Arc<FragmentNode>> {
        self.nodes.get(&id)
    }

    /// Whether the arena holds this id.
    pub fn contains(&self, id: FragmentId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of fragments in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Store (or overwrite) a node.
    pub(crate) fn put(&mut self, node: Arc<FragmentNode>) {
        self.nodes.insert(node.id, node);
    }

    /// Remove a node from the arena.
    pub(crate) fn remove(&mut self, id: FragmentId) -> Option<Arc<FragmentNode>> {
        self.nodes.remove(&id)
    }

    /// Mutable access to a node. Callers must have copy-on-write cloned the
    /// node into the current batch first; `Arc::make_mut` is only a backstop.
    pub(crate) fn node_mut(&mut self, id: FragmentId) -> Option<&mut FragmentNode> {
        self.nodes.get_mut(&id).map(Arc::make_mut)
    }

    /// The child id a path step resolves to under `parent`, if any.
    pub fn child_id_at(&self, parent: &FragmentNode, step: &PathStep) -> Option<FragmentId> {
        match (&parent.content, step) {
            (NodeContent::Map(children), PathStep::Key(key)) => children.get(key).copied(),
            (NodeContent::List(children), PathStep::Id(id)) => {
                children.contains(id).then_some(*id)
            }
            _ => None,
        }
    }

    /// The id of the list child currently at `index`, if any.
    pub fn list_child_with_index(&self, list: &FragmentNode, index: usize) -> Option<FragmentId> {
        let NodeContent::List(children) = &list.content else {
            return None;
        };
        children
            .iter()
            .copied()
            .find(|id| self.node(*id).and_then(|n| n.parent_list_index()) == Some(index))
    }

    /// Read-only resolution of a fragment path from the root.
    pub fn resolve_path(&self, path: &FragmentPath) -> Option<FragmentId> {
        let mut current = self.root;
        for step in path {
            let node = self.node(current)?;
            current = self.child_id_at(node, step)?;
        }
        Some(current)
    }

    /// All ids in the subtree rooted at `id` (inclusive), depth-first.
    pub fn subtree_ids(&self, id: FragmentId) -> Vec<FragmentId> {
        let mut ids = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            ids.push(current);
            if let Some(node) = self.node(current) {
                match &node.content {
                    NodeContent::Map(children) => stack.extend(children.values().copied()),
                    NodeContent::List(children) => stack.extend(children.iter().copied()),
                    NodeContent::Register(_) => {}
                }
            }
        }
        ids
    }

    /// Flatten a nested fragment into the arena under `parent_id` at `slot`.
    /// Returns the subtree root's id. Does *not* wire the parent's child
    /// collection — that is the engine's copy-on-write job.
    pub(crate) fn insert_subtree(
        &mut self,
        fragment: &Fragment,
        parent_id: FragmentId,
        slot: ParentSlot,
    ) -> Result<FragmentId> {
        flatten(fragment, Some(parent_id), Some(slot), &mut self.nodes)?;
        Ok(fragment.id)
    }

    /// Rebuild the nested form of the subtree rooted at `id`.
    pub fn snapshot(&self, id: FragmentId) -> Option<Fragment> {
        let node = self.node(id)?;
        let content = match &node.content {
            NodeContent::Map(children) => FragmentContent::Map(
                children
                    .iter()
                    .filter_map(|(key, child_id)| {
                        let child = self.snapshot(*child_id);
                        debug_assert!(child.is_some(), "map child missing from arena");
                        Some((key.clone(), child?))
                    })
                    .collect(),
            ),
            NodeContent::List(children) => FragmentContent::List(
                children
                    .iter()
                    .filter_map(|child_id| {
                        let child = self.snapshot(*child_id);
                        debug_assert!(child.is_some(), "list child missing from arena");
                        Some((*child_id, child?))
                    })
                    .collect(),
            ),
            NodeContent::Register(value) => FragmentContent::Register(value.clone()),
        };
        Some(Fragment {
            id: node.id,
            parent_id: node.parent_id,
            parent_map_key: node.parent_map_key().map(str::to_string),
            parent_list_index: node.parent_list_index(),
            content,
        })
    }

    /// Nested snapshot of the whole tree.
    pub fn snapshot_root(&self) -> Fragment {
        self.snapshot(self.root)
            .expect("root fragment always present in arena")
    }
}

/// Recursive worker for nested→arena conversion.
fn flatten(
    fragment: &Fragment,
    parent_id: Option<FragmentId>,
    slot: Option<ParentSlot>,
    nodes: &mut HashMap<FragmentId, Arc<FragmentNode>>,
) -> Result<()> {
    let content = match &fragment.content {
        FragmentContent::Map(children) => {
            let mut ids = HashMap::with_capacity(children.len());
            for (key, child) in children {
                ids.insert(key.clone(), child.id);
                flatten(
                    child,
                    Some(fragment.id),
                    Some(ParentSlot::MapKey(key.clone())),
                    nodes,
                )?;
            }
            NodeContent::Map(ids)
        }
        FragmentContent::List(children) => {
            let mut ids = HashSet::with_capacity(children.len());
            for child in children.values() {
                let index =
                    child
                        .parent_list_index
                        .ok_or_else(|| FragmentError::MalformedFragment {
                            id: child.id,
                            detail: "list child without a list index".to_string(),
                        })?;
                ids.insert(child.id);
                flatten(
                    child,
                    Some(fragment.id),
                    Some(ParentSlot::ListIndex(index)),
                    nodes,
                )?;
            }
            NodeContent::List(ids)
        }
        FragmentContent::Register(value) => NodeContent::Register(value.clone()),
    };
    nodes.insert(
        fragment.id,
        Arc::new(FragmentNode {
            id: fragment.id,
            parent_id,
            slot,
            content,
        }),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::convert::fragment_from_doc;
    use realtime_types::DocValue;

    use super::*;

    fn tree_from_json(value: serde_json::Value) -> FragmentTree {
        let doc = DocValue::from(value);
        FragmentTree::from_fragment(&fragment_from_doc(&doc)).unwrap()
    }

    #[test]
    fn test_flatten_counts_every_node() {
        let tree = tree_from_json(json!({"a": 1, "b": [2, 3]}));
        // root + a + b + two list items
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_resolve_path_by_slot_keys() {
        let tree = tree_from_json(json!({"items": [10, 20]}));
        let root = tree.node(tree.root_id()).unwrap();
        let items_id = tree
            .child_id_at(root, &PathStep::Key("items".to_string()))
            .unwrap();
        let items = tree.node(items_id).unwrap();
        let second = tree.list_child_with_index(items, 1).unwrap();

        let resolved = tree
            .resolve_path(&vec![PathStep::Key("items".to_string()), PathStep::Id(second)])
            .unwrap();
        assert_eq!(resolved, second);
    }

    #[test]
    fn test_snapshot_roundtrips_through_flatten() {
        let tree = tree_from_json(json!({"title": "t", "tags": ["x", "y"]}));
        let nested = tree.snapshot_root();
        let rebuilt = FragmentTree::from_fragment(&nested).unwrap();
        assert_eq!(rebuilt.len(), tree.len());
        assert_eq!(rebuilt.root_id(), tree.root_id());
    }

    #[test]
    fn test_subtree_ids_inclusive() {
        let tree = tree_from_json(json!({"a": {"b": 1}}));
        let root = tree.node(tree.root_id()).unwrap();
        let a_id = tree
            .child_id_at(root, &PathStep::Key("a".to_string()))
            .unwrap();
        let ids = tree.subtree_ids(a_id);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a_id));
    }

    #[test]
    fn test_clone_shares_nodes() {
        let tree = tree_from_json(json!({"a": 1}));
        let copy = tree.clone();
        let root_a = tree.node(tree.root_id()).unwrap();
        let root_b = copy.node(copy.root_id()).unwrap();
        assert!(Arc::ptr_eq(root_a, root_b));
    }
}
