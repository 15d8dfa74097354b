//! Conversion between document snapshots and fragments.
//!
//! Every node minted here gets a fresh [`FragmentId`]; the one exception is
//! the root of a replacement value, which may reuse the replaced fragment's
//! id so remote parties see the slot keep its identity.

use realtime_types::{DocValue, Fragment, FragmentContent, FragmentId};

/// Convert a document snapshot into a nested fragment with fresh ids.
///
/// The returned fragment is parentless; the mutation engine assigns
/// `parent_id` and the slot fields when it lands in the tree.
pub fn fragment_from_doc(value: &DocValue) -> Fragment {
    fragment_from_doc_with_id(value, FragmentId::new())
}

/// Convert a document snapshot into a nested fragment, reusing `id` for the
/// root node (identity continuity across a replace).
pub fn fragment_from_doc_with_id(value: &DocValue, id: FragmentId) -> Fragment {
    match value {
        DocValue::Map(entries) => {
            let mut fragment = Fragment::map(id);
            let FragmentContent::Map(children) = &mut fragment.content else {
                unreachable!()
            };
            for (key, child_value) in entries {
                let mut child = fragment_from_doc(child_value);
                child.parent_id = Some(id);
                child.parent_map_key = Some(key.clone());
                children.insert(key.clone(), child);
            }
            fragment
        }
        DocValue::List(items) => {
            let mut fragment = Fragment::list(id);
            let FragmentContent::List(children) = &mut fragment.content else {
                unreachable!()
            };
            for (index, item) in items.iter().enumerate() {
                let mut child = fragment_from_doc(item);
                child.parent_id = Some(id);
                child.parent_list_index = Some(index);
                children.insert(child.id, child);
            }
            fragment
        }
        DocValue::Scalar(scalar) => Fragment::register(id, scalar.clone()),
    }
}

/// Convert a nested fragment back into a document snapshot (list children
/// ordered by their list index).
pub fn doc_from_fragment(fragment: &Fragment) -> DocValue {
    match &fragment.content {
        FragmentContent::Map(children) => DocValue::Map(
            children
                .iter()
                .map(|(key, child)| (key.clone(), std::sync::Arc::new(doc_from_fragment(child))))
                .collect(),
        ),
        FragmentContent::List(children) => {
            let mut ordered: Vec<&Fragment> = children.values().collect();
            ordered.sort_by_key(|child| child.parent_list_index.unwrap_or(usize::MAX));
            DocValue::List(
                ordered
                    .into_iter()
                    .map(|child| std::sync::Arc::new(doc_from_fragment(child)))
                    .collect(),
            )
        }
        FragmentContent::Register(value) => DocValue::Scalar(value.clone()),
    }
}
