//! Shared types for the realtime client core.
//!
//! This crate is the leaf foundation: fragment identity, the nested
//! fragment model, path addressing, snapshot values, low-level patches, and
//! outbound wire requests. It has **no internal dependencies** — the
//! mutation engine and auth crates build on it.
//!
//! # Type overview
//!
//! |----------------------------|---------------------------------------------|
//! | Type                       | Purpose                                     |
//! |----------------------------|---------------------------------------------|
//! | [`FragmentId`]             | Opaque fragment identity (UUIDv4)           |
//! | [`Fragment`]               | Nested, wire-serializable tree node         |
//! | [`FragmentContent`]        | Map / List / Register payload               |
//! | [`FragmentPath`]           | Slot keys root→node (map key or child id)   |
//! | [`DocPath`]                | Raw key/index path into a snapshot          |
//! | [`DocValue`]               | Identity-bearing document snapshot          |
//! | [`LocalPatch`]             | Raw patch record from the snapshot differ   |
//! | [`LocalOperation`]         | Canonical insert/delete/move/replace stream |
//! | [`DocumentOperationRequest`] | Outbound request for the transport layer  |
//! |----------------------------|---------------------------------------------|

pub mod fragment;
pub mod ids;
pub mod patch;
pub mod path;
pub mod request;
pub mod value;

// Re-export primary types at crate root for convenience.
pub use fragment::{Fragment, FragmentContent, FragmentType};
pub use ids::FragmentId;
pub use patch::{LocalOperation, LocalPatch, PatchOp};
pub use path::{DocPath, DocStep, FragmentPath, PathStep};
pub use request::DocumentOperationRequest;
pub use value::DocValue;
