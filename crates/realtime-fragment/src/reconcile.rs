//! List reconciliation: turning a before/after list snapshot into canonical
//! operations.
//!
//! Precondition: unchanged elements must be *pointer-identical* between the
//! two snapshots (`Arc::ptr_eq`), not merely equal by value. The optimistic
//! mutation layer guarantees this by reusing the `Arc` of every untouched
//! subtree; a caller that deep-copies its snapshots will see every edit
//! reported as a wholesale rewrite.
//!
//! The algorithm is a two-pointer merge over the old (`i`) and new (`j`)
//! positions. Both pointers advance in lockstep, so `i == j` holds at every
//! iteration:
//!
//! 1. pointer-equal elements match and both pointers advance;
//! 2. an old element absent from the new list becomes a `delete`;
//! 3. a new element absent from the old list becomes an `insert` — or a
//!    `replace` when it lands on the index a `delete` was just emitted for;
//! 4. otherwise both elements exist on the other side and a single `move`
//!    unblocks the merge (see [`reconcile_list`] for which element moves).
//!
//! Leftover old elements become `delete`s, leftover new elements `insert`s
//! (again collapsing onto a just-emitted `delete` as a `replace`).

use std::sync::Arc;

use tracing::warn;

use realtime_types::{DocStep, DocValue, LocalOperation, LocalPatch, PatchOp};

fn position_of(items: &[Arc<DocValue>], target: &Arc<DocValue>) -> Option<usize> {
    items.iter().position(|item| Arc::ptr_eq(item, target))
}

/// Whether the last emitted operation is a `delete` at list position `index`;
/// if so it is retracted so the caller can emit a `replace` instead.
fn retract_delete_at(ops: &mut Vec<LocalOperation>, index: usize) -> bool {
    let matches = matches!(
        ops.last(),
        Some(LocalOperation::Delete {
            index: DocStep::Index(deleted),
            ..
        }) if *deleted == index
    );
    if matches {
        ops.pop();
    }
    matches
}

/// Compute the canonical operations transforming `old_items` into
/// `new_items` for the list at `path`.
///
/// When step 4 hits, two moves are possible and the cheaper one is chosen:
/// if pushing `old[i]` out of the way makes the very next pair match, a
/// single forward move of `old[i]` is emitted; otherwise the element
/// `new[j]` is pulled forward from its position later in the old list.
///
/// `list_patches` are the raw patch records that touched this list in the
/// same update. Every structural `insert`/`delete`/`replace` should be
/// corroborated by a patch at its index; one that is not is reported as a
/// warning but still returned — dropping it would leave the transform
/// incomplete.
pub fn reconcile_list(
    path: &[DocStep],
    list_patches: &[LocalPatch],
    old_items: &[Arc<DocValue>],
    new_items: &[Arc<DocValue>],
) -> Vec<LocalOperation> {
    let mut old: Vec<Arc<DocValue>> = old_items.to_vec();
    let mut ops: Vec<LocalOperation> = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < old.len() && j < new_items.len() {
        if Arc::ptr_eq(&old[i], &new_items[j]) {
            i += 1;
            j += 1;
            continue;
        }

        if position_of(new_items, &old[i]).is_none() {
            ops.push(LocalOperation::Delete {
                parent_path: path.to_vec(),
                index: DocStep::Index(i),
            });
            old.remove(i);
            continue;
        }

        if position_of(&old, &new_items[j]).is_none() {
            let value = Arc::clone(&new_items[j]);
            if retract_delete_at(&mut ops, i) {
                ops.push(LocalOperation::Replace {
                    parent_path: path.to_vec(),
                    index: DocStep::Index(i),
                    value: Arc::clone(&value),
                });
            } else {
                ops.push(LocalOperation::Insert {
                    parent_path: path.to_vec(),
                    index: DocStep::Index(i),
                    value: Arc::clone(&value),
                });
            }
            old.insert(i, value);
            i += 1;
            j += 1;
            continue;
        }

        // Both elements exist on the other side: one move unblocks the merge.
        if i + 1 < old.len() && Arc::ptr_eq(&old[i + 1], &new_items[j]) {
            // Push old[i] forward to its final position; the next pair then
            // matches immediately, so a single operation covers the rotation.
            let to = position_of(&new_items[j..], &old[i])
                .map(|p| p + j)
                .unwrap_or(new_items.len() - 1);
            ops.push(LocalOperation::Move {
                list_path: path.to_vec(),
                from: i,
                to,
            });
            let moved = old.remove(i);
            let landing = to.min(old.len());
            old.insert(landing, moved);
        } else {
            // Pull new[j] forward from its position later in the old list.
            let from = position_of(&old[i..], &new_items[j])
                .map(|p| p + i)
                .unwrap_or(old.len() - 1);
            ops.push(LocalOperation::Move {
                list_path: path.to_vec(),
                from,
                to: i,
            });
            let moved = old.remove(from);
            old.insert(i, moved);
        }
    }

    while i < old.len() {
        ops.push(LocalOperation::Delete {
            parent_path: path.to_vec(),
            index: DocStep::Index(i),
        });
        old.remove(i);
    }
    while j < new_items.len() {
        let value = Arc::clone(&new_items[j]);
        if retract_delete_at(&mut ops, i) {
            ops.push(LocalOperation::Replace {
                parent_path: path.to_vec(),
                index: DocStep::Index(i),
                value,
            });
        } else {
            ops.push(LocalOperation::Insert {
                parent_path: path.to_vec(),
                index: DocStep::Index(i),
                value,
            });
        }
        i += 1;
        j += 1;
    }

    corroborate(&ops, list_patches, path);
    ops
}

/// Check each structural operation against the raw patch records. A missing
/// corroborating patch usually means identity was not preserved between the
/// snapshots (see the module precondition).
fn corroborate(ops: &[LocalOperation], list_patches: &[LocalPatch], path: &[DocStep]) {
    for op in ops {
        let index = match op {
            LocalOperation::Insert {
                index: DocStep::Index(index),
                ..
            }
            | LocalOperation::Delete {
                index: DocStep::Index(index),
                ..
            }
            | LocalOperation::Replace {
                index: DocStep::Index(index),
                ..
            } => *index,
            _ => continue,
        };
        let corroborated = list_patches.iter().any(|patch| {
            matches!(patch.op, PatchOp::Add | PatchOp::Replace)
                && patch.path.last() == Some(&DocStep::Index(index))
        });
        if !corroborated {
            warn!(
                path = %path.iter().map(ToString::to_string).collect::<Vec<_>>().join("."),
                index,
                "list operation has no corroborating patch"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn item(value: serde_json::Value) -> Arc<DocValue> {
        Arc::new(DocValue::from(value))
    }

    /// Interpret the operations literally against `old` and return the result.
    fn apply(old: &[Arc<DocValue>], ops: &[LocalOperation]) -> Vec<Arc<DocValue>> {
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

    fn ptr_identical(a: &[Arc<DocValue>], b: &[Arc<DocValue>]) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(left, right)| Arc::ptr_eq(left, right))
    }

    #[test]
    fn test_identical_lists_produce_no_operations() {
        let items = vec![item(json!(1)), item(json!(2))];
        let ops = reconcile_list(&[], &[], &items, &items.clone());
        assert_eq!(ops, vec![]);
    }

    #[test]
    fn test_empty_old_is_all_inserts() {
        let new = vec![item(json!("a")), item(json!("b"))];
        let ops = reconcile_list(&[], &[], &[], &new);
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], LocalOperation::Insert { .. }));
        assert!(ptr_identical(&apply(&[], &ops), &new));
    }

    #[test]
    fn test_empty_new_is_all_deletes() {
        let old = vec![item(json!("a")), item(json!("b"))];
        let ops = reconcile_list(&[], &[], &old, &[]);
        assert_eq!(ops.len(), 2);
        assert!(ops
            .iter()
            .all(|op| matches!(op, LocalOperation::Delete { .. })));
        assert!(apply(&old, &ops).is_empty());
    }

    #[test]
    fn test_front_rotation_is_one_move() {
        let a = item(json!("a"));
        let b = item(json!("b"));
        let c = item(json!("c"));
        let old = vec![Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)];
        let new = vec![b, c, a];

        let ops = reconcile_list(&[], &[], &old, &new);
        assert_eq!(
            ops,
            vec![LocalOperation::Move {
                list_path: vec![],
                from: 0,
                to: 2,
            }]
        );
        assert!(ptr_identical(&apply(&old, &ops), &new));
    }

    #[test]
    fn test_pull_forward_is_one_move() {
        let a = item(json!("a"));
        let b = item(json!("b"));
        let c = item(json!("c"));
        let old = vec![Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)];
        let new = vec![Arc::clone(&c), a, b];

        let ops = reconcile_list(&[], &[], &old, &new);
        assert_eq!(
            ops,
            vec![LocalOperation::Move {
                list_path: vec![],
                from: 2,
                to: 0,
            }]
        );
        assert!(ptr_identical(&apply(&old, &ops), &new));
    }

    #[test]
    fn test_tail_swap_collapses_to_replace() {
        let a = item(json!("a"));
        let b = item(json!("b"));
        let c = item(json!("c"));
        let old = vec![Arc::clone(&a), b];
        let new = vec![a, Arc::clone(&c)];
        let patches = vec![LocalPatch::new(
            PatchOp::Replace,
            vec![DocStep::Index(1)],
            Arc::clone(&c),
        )];

        let ops = reconcile_list(&[], &patches, &old, &new);
        assert_eq!(
            ops,
            vec![LocalOperation::Replace {
                parent_path: vec![],
                index: DocStep::Index(1),
                value: c,
            }]
        );
        assert!(ptr_identical(&apply(&old, &ops), &new));
    }

    #[test]
    fn test_mid_list_swap_collapses_to_replace() {
        let a = item(json!("a"));
        let b = item(json!("b"));
        let c = item(json!("c"));
        let d = item(json!("d"));
        let old = vec![Arc::clone(&a), b, Arc::clone(&c)];
        let new = vec![a, Arc::clone(&d), c];

        let ops = reconcile_list(&[], &[], &old, &new);
        assert_eq!(
            ops,
            vec![LocalOperation::Replace {
                parent_path: vec![],
                index: DocStep::Index(1),
                value: d,
            }]
        );
        assert!(ptr_identical(&apply(&old, &ops), &new));
    }

    #[test]
    fn test_uncorroborated_operations_are_kept() {
        let a = item(json!("a"));
        let b = item(json!("b"));
        let old = vec![a];
        let new = vec![b];
        // No patches at all: the replace is warned about but not dropped.
        let ops = reconcile_list(&[], &[], &old, &new);
        assert_eq!(ops.len(), 1);
        assert!(ptr_identical(&apply(&old, &ops), &new));
    }

    #[test]
    fn test_interleaved_edit_round_trips() {
        let items: Vec<Arc<DocValue>> = (0..6).map(|n| item(json!(n))).collect();
        let fresh = item(json!("fresh"));
        // delete 1, move 5 forward, insert a new element
        let old = items.clone();
        let new = vec![
            Arc::clone(&items[0]),
            Arc::clone(&items[5]),
            Arc::clone(&items[2]),
            Arc::clone(&fresh),
            Arc::clone(&items[3]),
            Arc::clone(&items[4]),
        ];

        let ops = reconcile_list(&[], &[], &old, &new);
        assert!(ptr_identical(&apply(&old, &ops), &new));
    }
}
