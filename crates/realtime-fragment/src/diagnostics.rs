//! Defensive diagnostics for the mutation engine.
//!
//! List index integrity (children's positions are exactly `{0..n-1}`, no
//! duplicates) is a programming invariant, not a user-facing condition. When
//! enabled, the engine verifies it around every list mutation and reports
//! violations as structured warnings. Diagnostics never alter control flow.

use std::collections::HashSet;

use tracing::warn;

use crate::tree::{FragmentNode, FragmentTree, NodeContent};

/// Which defensive checks the engine runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiagnosticsConfig {
    /// Verify list index integrity around every list mutation.
    pub check_list_indexes: bool,
}

impl DiagnosticsConfig {
    /// All checks enabled.
    pub fn strict() -> Self {
        Self {
            check_list_indexes: true,
        }
    }
}

/// Verify that `list`'s children occupy positions `{0..n-1}` with no
/// duplicates, warning about each violation. `stage` names the mutation
/// decision point for the log line.
pub fn check_list_indexes(tree: &FragmentTree, list: &FragmentNode, stage: &str) {
    let NodeContent::List(children) = &list.content else {
        return;
    };

    let indexes: Vec<Option<usize>> = children
        .iter()
        .map(|id| tree.node(*id).and_then(|n| n.parent_list_index()))
        .collect();

    let mut seen = HashSet::new();
    for (id, index) in children.iter().zip(&indexes) {
        match index {
            None => warn!(list = %list.id, child = %id, stage, "list child has no list index"),
            Some(index) if !seen.insert(*index) => {
                warn!(list = %list.id, child = %id, index, stage, "duplicate list index")
            }
            Some(_) => {}
        }
    }
    for expected in 0..children.len() {
        if !seen.contains(&expected) {
            warn!(list = %list.id, index = expected, stage, "missing list index");
        }
    }
}
