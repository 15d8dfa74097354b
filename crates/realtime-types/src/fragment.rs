//! The nested fragment model mirroring the synchronized document.
//!
//! A [`Fragment`] is an identity-bearing node in the document tree. Three
//! structural kinds exist:
//!
//! - **Map**: children keyed by string map key, insertion order irrelevant
//! - **List**: children keyed by *child id*; ordering lives on each child's
//!   `parent_list_index`, not on the container
//! - **Register**: an opaque scalar leaf
//!
//! Every non-root fragment carries a back-reference to its parent (`parent_id`)
//! plus exactly one slot field matching the parent's kind: `parent_map_key`
//! for map children, `parent_list_index` for list children. The root carries
//! neither. A list's children's `parent_list_index` values are always exactly
//! `{0..n-1}` with no duplicates between mutations.
//!
//! This nested form is what travels on the wire (`value` of root/insert
//! requests). The mutation engine keeps its own arena representation and
//! produces nested snapshots on demand.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::FragmentId;

/// The structural kind of a fragment.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum FragmentType {
    Map,
    List,
    Register,
}

/// The kind-specific payload of a fragment, tagged as `type` / `value` on
/// the wire.
///
/// Note the list payload is keyed by child id — a list's `value` mapping
/// carries no ordering information.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FragmentContent {
    #[serde(rename = "MAP")]
    Map(HashMap<String, Fragment>),
    #[serde(rename = "LIST")]
    List(HashMap<FragmentId, Fragment>),
    #[serde(rename = "REGISTER")]
    Register(serde_json::Value),
}

impl FragmentContent {
    /// The structural kind of this payload.
    pub fn fragment_type(&self) -> FragmentType {
        match self {
            FragmentContent::Map(_) => FragmentType::Map,
            FragmentContent::List(_) => FragmentType::List,
            FragmentContent::Register(_) => FragmentType::Register,
        }
    }

    /// Number of direct children (0 for registers).
    pub fn child_count(&self) -> usize {
        match self {
            FragmentContent::Map(children) => children.len(),
            FragmentContent::List(children) => children.len(),
            FragmentContent::Register(_) => 0,
        }
    }
}

/// An identity-bearing node in the synchronized document tree (nested form).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// Opaque, globally unique, immutable identity.
    pub id: FragmentId,
    /// Back-reference to the owning fragment. Absent only for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FragmentId>,
    /// Slot key when the parent is a map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_map_key: Option<String>,
    /// Zero-based position when the parent is a list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_list_index: Option<usize>,
    /// Kind-specific payload (`type` + `value` on the wire).
    #[serde(flatten)]
    pub content: FragmentContent,
}

impl Fragment {
    /// A parentless map fragment.
    pub fn map(id: FragmentId) -> Self {
        Self {
            id,
            parent_id: None,
            parent_map_key: None,
            parent_list_index: None,
            content: FragmentContent::Map(HashMap::new()),
        }
    }

    /// A parentless list fragment.
    pub fn list(id: FragmentId) -> Self {
        Self {
            id,
            parent_id: None,
            parent_map_key: None,
            parent_list_index: None,
            content: FragmentContent::List(HashMap::new()),
        }
    }

    /// A parentless register (scalar leaf) fragment.
    pub fn register(id: FragmentId, value: serde_json::Value) -> Self {
        Self {
            id,
            parent_id: None,
            parent_map_key: None,
            parent_list_index: None,
            content: FragmentContent::Register(value),
        }
    }

    /// The structural kind of this fragment.
    pub fn fragment_type(&self) -> FragmentType {
        self.content.fragment_type()
    }

    /// Whether the fragment is a list.
    pub fn is_list(&self) -> bool {
        matches!(self.content, FragmentContent::List(_))
    }

    /// Whether the fragment is a map.
    pub fn is_map(&self) -> bool {
        matches!(self.content, FragmentContent::Map(_))
    }
}
