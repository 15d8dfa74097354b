//! Identity-bearing document snapshots.
//!
//! [`DocValue`] is the JSON-like snapshot form the optimistic mutation API
//! hands to the translation layer. Children are `Arc`-shared, and that
//! sharing is load-bearing: a before/after snapshot pair must reuse the same
//! `Arc` for every unchanged subtree, because list reconciliation matches
//! elements by *pointer identity*, not by value. Producing snapshots that
//! copy unchanged children will make every list edit look like a wholesale
//! rewrite.
//!
//! Scalars never hold `Value::Object` or `Value::Array`; the constructors
//! route those to maps and lists.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::DocStep;

/// A JSON-like document snapshot node with `Arc`-shared children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocValue {
    /// Object node; key order is preserved.
    Map(IndexMap<String, Arc<DocValue>>),
    /// Array node.
    List(Vec<Arc<DocValue>>),
    /// Scalar leaf (null, bool, number, or string).
    Scalar(serde_json::Value),
}

impl DocValue {
    /// Pointer identity of two snapshot nodes.
    pub fn ptr_eq(a: &Arc<DocValue>, b: &Arc<DocValue>) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// Whether this node is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, DocValue::List(_))
    }

    /// The list elements, if this node is a list.
    pub fn as_list(&self) -> Option<&[Arc<DocValue>]> {
        match self {
            DocValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The map entries, if this node is a map.
    pub fn as_map(&self) -> Option<&IndexMap<String, Arc<DocValue>>> {
        match self {
            DocValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Child at a single path step, if present.
    pub fn get(&self, step: &DocStep) -> Option<&Arc<DocValue>> {
        match (self, step) {
            (DocValue::Map(entries), DocStep::Key(key)) => entries.get(key),
            (DocValue::List(items), DocStep::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    /// Resolve a path of steps from this node.
    pub fn get_path<'a>(self: &'a Arc<Self>, path: &[DocStep]) -> Option<&'a Arc<DocValue>> {
        let mut current = self;
        for step in path {
            current = current.get(step)?;
        }
        Some(current)
    }

    /// Convert back to a plain `serde_json::Value` (deep copy, identity lost).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DocValue::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            DocValue::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect())
            }
            DocValue::Scalar(value) => value.clone(),
        }
    }
}

impl From<serde_json::Value> for DocValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(entries) => DocValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Arc::new(DocValue::from(v))))
                    .collect(),
            ),
            serde_json::Value::Array(items) => {
                DocValue::List(items.into_iter().map(|v| Arc::new(DocValue::from(v))).collect())
            }
            scalar => DocValue::Scalar(scalar),
        }
    }
}
