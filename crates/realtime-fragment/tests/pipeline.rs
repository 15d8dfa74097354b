//! End-to-end tests over the patch → operation → request pipeline.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

use realtime_fragment::{
    apply_operations_to_fragment, build_path_index, fragment_from_doc, local_patches_to_operations,
    reconcile_list, FragmentError, FragmentTree, ImmutableFragment,
};
use realtime_types::{
    DocStep, DocValue, DocumentOperationRequest, LocalOperation, LocalPatch, PatchOp,
};

fn doc(value: serde_json::Value) -> Arc<DocValue> {
    Arc::new(DocValue::from(value))
}

fn state_for(value: &Arc<DocValue>) -> (FragmentTree, realtime_fragment::FragmentIdToPath) {
    let fragment = fragment_from_doc(value);
    let tree = FragmentTree::from_fragment(&fragment).unwrap();
    let index = build_path_index(&tree);
    (tree, index)
}

fn tree_json(tree: &FragmentTree) -> serde_json::Value {
    realtime_fragment::doc_from_fragment(&tree.snapshot_root()).to_json()
}

/// Interpret reconciliation output literally against a plain list.
fn apply_list_ops(old: &[Arc<DocValue>], ops: &[LocalOperation]) -> Vec<Arc<DocValue>> {
    let mut list = old.to_vec();
    for op in ops {
        match op {
            LocalOperation::Insert {
                index: DocStep::Index(i),
                value,
                ..
            } => list.insert((*i).min(list.len()), Arc::clone(value)),
            LocalOperation::Delete {
                index: DocStep::Index(i),
                ..
            } => {
                list.remove(*i);
            }
            LocalOperation::Replace {
                index: DocStep::Index(i),
                value,
                ..
            } => list[*i] = Arc::clone(value),
            LocalOperation::Move { from, to, .. } => {
                let moved = list.remove(*from);
                let landing = (*to).min(list.len());
                list.insert(landing, moved);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }
    list
}

// ----------------------------------------------------------------------------
// Index and list integrity across mixed batches
// ----------------------------------------------------------------------------

#[test]
fn path_index_stays_consistent_across_mixed_batch() {
    let old = doc(json!({
        "title": "board",
        "columns": [
            {"name": "todo", "cards": ["a", "b"]},
            {"name": "done", "cards": []}
        ]
    }));
    let (tree, index) = state_for(&old);

    let ops = vec![
        LocalOperation::Insert {
            parent_path: vec![
                DocStep::from("columns"),
                DocStep::Index(0),
                DocStep::from("cards"),
            ],
            index: DocStep::Index(1),
            value: doc(json!("between")),
        },
        LocalOperation::Delete {
            parent_path: vec![DocStep::from("columns"), DocStep::Index(1)],
            index: DocStep::from("name"),
        },
        LocalOperation::Move {
            list_path: vec![
                DocStep::from("columns"),
                DocStep::Index(0),
                DocStep::from("cards"),
            ],
            from: 0,
            to: 2,
        },
        LocalOperation::Replace {
            parent_path: vec![],
            index: DocStep::from("title"),
            value: doc(json!("renamed")),
        },
    ];

    let applied = apply_operations_to_fragment(tree, index, &ops).unwrap();
    assert_eq!(
        tree_json(&applied.tree),
        json!({
            "title": "renamed",
            "columns": [
                {"name": "todo", "cards": ["between", "b", "a"]},
                {"cards": []}
            ]
        })
    );

    // Every indexed id resolves back to itself, and nothing is dangling.
    assert_eq!(applied.index.len(), applied.tree.len());
    for (id, path) in &applied.index {
        assert_eq!(applied.tree.resolve_path(path), Some(*id));
    }
}

#[test]
fn list_indexes_are_dense_after_every_mutation() {
    let old = doc(json!({"items": ["a", "b", "c", "d"]}));
    let (tree, index) = state_for(&old);

    let ops = vec![
        LocalOperation::Delete {
            parent_path: vec![DocStep::from("items")],
            index: DocStep::Index(1),
        },
        LocalOperation::Move {
            list_path: vec![DocStep::from("items")],
            from: 2,
            to: 0,
        },
        LocalOperation::Insert {
            parent_path: vec![DocStep::from("items")],
            index: DocStep::Index(2),
            value: doc(json!("x")),
        },
    ];
    let applied = apply_operations_to_fragment(tree, index, &ops).unwrap();
    assert_eq!(tree_json(&applied.tree), json!({"items": ["d", "a", "x", "c"]}));

    // Dense positions: snapshotting sorts by index, so every position in
    // 0..n must be occupied exactly once for the JSON above to hold; check
    // the arena directly as well.
    let root = applied.tree.node(applied.tree.root_id()).unwrap();
    let items_id = applied
        .tree
        .child_id_at(root, &realtime_types::PathStep::Key("items".to_string()))
        .unwrap();
    let items = applied.tree.node(items_id).unwrap();
    let mut positions: Vec<usize> = applied
        .tree
        .subtree_ids(items_id)
        .into_iter()
        .filter(|id| *id != items_id)
        .filter_map(|id| applied.tree.node(id).and_then(|n| n.parent_list_index()))
        .collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![0, 1, 2, 3]);
    assert_eq!(items.content.child_count(), 4);
}

#[test]
fn batch_clones_each_node_once_and_preserves_old_snapshot() {
    let old = doc(json!({"items": [1, 2, 3]}));
    let (tree, index) = state_for(&old);
    let before = tree.clone();

    let mut engine = ImmutableFragment::new(tree, index);
    engine
        .move_index_at_path(&[DocStep::from("items")], 0, 2)
        .unwrap();

    // Second mutation of the same list reuses the batch's clones in place.
    let root_ptr = Arc::as_ptr(engine.tree().node(engine.tree().root_id()).unwrap());
    engine
        .move_index_at_path(&[DocStep::from("items")], 0, 1)
        .unwrap();
    assert_eq!(
        Arc::as_ptr(engine.tree().node(engine.tree().root_id()).unwrap()),
        root_ptr
    );

    // The pre-batch snapshot still reads the original ordering.
    assert_eq!(tree_json(&before), json!({"items": [1, 2, 3]}));
    assert_eq!(tree_json(engine.tree()), json!({"items": [3, 2, 1]}));
}

#[test]
fn move_to_out_of_bounds_index_clamps() {
    let old = doc(json!({"items": ["a", "b", "c"]}));
    let (tree, index) = state_for(&old);
    let mut engine = ImmutableFragment::new(tree, index);
    let moved = engine
        .move_index_at_path(&[DocStep::from("items")], 0, 10)
        .unwrap();
    assert_eq!(moved.to_index, 2);
    assert_eq!(tree_json(engine.tree()), json!({"items": ["b", "c", "a"]}));
}

// ----------------------------------------------------------------------------
// Reference scenarios
// ----------------------------------------------------------------------------

#[test]
fn front_to_back_rotation_is_a_single_move() {
    let a = doc(json!("a"));
    let b = doc(json!("b"));
    let c = doc(json!("c"));
    let old = vec![Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)];
    let new = vec![b, c, a];

    let ops = reconcile_list(&[DocStep::from("items")], &[], &old, &new);
    assert_eq!(
        ops,
        vec![LocalOperation::Move {
            list_path: vec![DocStep::from("items")],
            from: 0,
            to: 2,
        }]
    );
}

#[test]
fn tail_replacement_is_a_single_replace() {
    let a = doc(json!("a"));
    let b = doc(json!("b"));
    let c = doc(json!("c"));
    let old = vec![Arc::clone(&a), b];
    let new = vec![a, Arc::clone(&c)];
    let patches = vec![LocalPatch::new(
        PatchOp::Replace,
        vec![DocStep::from("items"), DocStep::Index(1)],
        Arc::clone(&c),
    )];

    let ops = reconcile_list(&[DocStep::from("items")], &patches, &old, &new);
    assert_eq!(
        ops,
        vec![LocalOperation::Replace {
            parent_path: vec![DocStep::from("items")],
            index: DocStep::Index(1),
            value: c,
        }]
    );
}

#[test]
fn out_of_bounds_insert_appends_without_disturbing_siblings() {
    let old = doc(json!({"items": ["a", "b", "c"]}));
    let (tree, index) = state_for(&old);

    let sibling_indexes_before: Vec<(String, usize)> = sibling_indexes(&tree);

    let ops = vec![LocalOperation::Insert {
        parent_path: vec![DocStep::from("items")],
        index: DocStep::Index(5),
        value: doc(json!("x")),
    }];
    let applied = apply_operations_to_fragment(tree, index, &ops).unwrap();
    assert_eq!(
        tree_json(&applied.tree),
        json!({"items": ["a", "b", "c", "x"]})
    );
    assert_eq!(sibling_indexes(&applied.tree)[..3], sibling_indexes_before[..]);

    let DocumentOperationRequest::Insert {
        parent_list_index, ..
    } = &applied.requests[0]
    else {
        panic!("expected insert request");
    };
    assert_eq!(*parent_list_index, Some(3));
}

/// `(value, parent_list_index)` for each child of the `items` list, ordered
/// by position.
fn sibling_indexes(tree: &FragmentTree) -> Vec<(String, usize)> {
    let root = tree.node(tree.root_id()).unwrap();
    let items_id = tree
        .child_id_at(root, &realtime_types::PathStep::Key("items".to_string()))
        .unwrap();
    let mut entries: Vec<(String, usize)> = tree
        .subtree_ids(items_id)
        .into_iter()
        .filter(|id| *id != items_id)
        .filter_map(|id| {
            let node = tree.node(id)?;
            let index = node.parent_list_index()?;
            let value = realtime_fragment::doc_from_fragment(&tree.snapshot(id)?)
                .to_json()
                .as_str()?
                .to_string();
            Some((value, index))
        })
        .collect();
    entries.sort_by_key(|(_, index)| *index);
    entries
}

#[test]
fn delete_shifts_later_siblings_only() {
    let old = doc(json!({"items": ["a", "b", "c"]}));
    let (tree, index) = state_for(&old);
    let ops = vec![LocalOperation::Delete {
        parent_path: vec![DocStep::from("items")],
        index: DocStep::Index(1),
    }];
    let applied = apply_operations_to_fragment(tree, index, &ops).unwrap();
    assert_eq!(
        sibling_indexes(&applied.tree),
        vec![("a".to_string(), 0), ("c".to_string(), 1)]
    );
}

#[test]
fn root_replace_cannot_share_a_batch() {
    let old = doc(json!({"a": 1}));
    let (tree, index) = state_for(&old);
    let ops = vec![
        LocalOperation::Root {
            value: doc(json!({})),
        },
        LocalOperation::Delete {
            parent_path: vec![],
            index: DocStep::from("a"),
        },
    ];
    let err = apply_operations_to_fragment(tree, index, &ops).unwrap_err();
    assert!(matches!(err, FragmentError::RootNotExclusive));
}

// ----------------------------------------------------------------------------
// Patch stream end to end
// ----------------------------------------------------------------------------

#[test]
fn patch_stream_to_requests() {
    let old = doc(json!({"profile": {"name": "ada"}, "tags": ["x"]}));
    let new = doc(json!({"profile": {"name": "grace"}, "tags": ["x"]}));
    let patches = vec![LocalPatch::new(
        PatchOp::Replace,
        vec![DocStep::from("profile"), DocStep::from("name")],
        doc(json!("grace")),
    )];

    let ops = local_patches_to_operations(&patches, &old, &new);
    let (tree, index) = state_for(&old);
    let applied = apply_operations_to_fragment(tree, index, &ops).unwrap();

    assert_eq!(
        tree_json(&applied.tree),
        json!({"profile": {"name": "grace"}, "tags": ["x"]})
    );
    // A map-slot replace goes out as delete + insert with the id reused.
    assert_eq!(applied.requests.len(), 2);
    let DocumentOperationRequest::Delete { id, .. } = &applied.requests[0] else {
        panic!("expected delete request");
    };
    let DocumentOperationRequest::Insert { value, .. } = &applied.requests[1] else {
        panic!("expected insert request");
    };
    assert_eq!(value.id, *id);
    assert_eq!(value.parent_map_key.as_deref(), Some("name"));
}

// ----------------------------------------------------------------------------
// Diff round-trip fuzzing
// ----------------------------------------------------------------------------

/// Turn index selections into identity-distinct lists drawn from one pool.
fn pooled_lists(
    old_sel: &[usize],
    new_sel: &[usize],
) -> (Vec<Arc<DocValue>>, Vec<Arc<DocValue>>) {
    let pool: Vec<Arc<DocValue>> = (0..8).map(|n| doc(json!(n))).collect();
    let pick = |sel: &[usize]| {
        let mut seen = std::collections::HashSet::new();
        sel.iter()
            .filter(|n| seen.insert(**n))
            .map(|n| Arc::clone(&pool[*n]))
            .collect::<Vec<_>>()
    };
    (pick(old_sel), pick(new_sel))
}

proptest! {
    #[test]
    fn reconciliation_output_transforms_old_into_new(
        old_sel in proptest::collection::vec(0usize..8, 0..8),
        new_sel in proptest::collection::vec(0usize..8, 0..8),
    ) {
        let (old, new) = pooled_lists(&old_sel, &new_sel);
        let ops = reconcile_list(&[], &[], &old, &new);

        let result = apply_list_ops(&old, &ops);
        prop_assert_eq!(result.len(), new.len());
        for (left, right) in result.iter().zip(&new) {
            prop_assert!(Arc::ptr_eq(left, right));
        }
    }

    #[test]
    fn reconciled_edits_apply_cleanly_through_the_engine(
        old_sel in proptest::collection::vec(0usize..8, 0..8),
        new_sel in proptest::collection::vec(0usize..8, 0..8),
    ) {
        let (old, new) = pooled_lists(&old_sel, &new_sel);
        let old_doc = Arc::new(DocValue::Map(
            [("items".to_string(), Arc::new(DocValue::List(old.clone())))]
                .into_iter()
                .collect(),
        ));
        let new_json = serde_json::Value::Array(new.iter().map(|v| v.to_json()).collect());

        let ops = reconcile_list(&[DocStep::from("items")], &[], &old, &new);
        let (tree, index) = state_for(&old_doc);
        let applied = apply_operations_to_fragment(tree, index, &ops).unwrap();

        prop_assert_eq!(tree_json(&applied.tree), json!({"items": new_json}));
        prop_assert_eq!(applied.index.len(), applied.tree.len());
        for (id, path) in &applied.index {
            prop_assert_eq!(applied.tree.resolve_path(path), Some(*id));
        }
    }
}
