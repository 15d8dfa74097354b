//! Client-side document synchronization core: the fragment tree, its
//! copy-on-write mutation engine, and the patch → operation → request
//! translation pipeline.
//!
//! | module        | role                                                    |
//! |---------------|---------------------------------------------------------|
//! | `tree`        | arena-backed fragment storage, nested⇄arena conversion  |
//! | `index`       | id → path lookup table and its maintenance helpers      |
//! | `convert`     | document snapshot ⇄ nested fragment conversion          |
//! | `engine`      | per-batch copy-on-write mutation engine                 |
//! | `reconcile`   | before/after list diffing into canonical operations     |
//! | `translate`   | patches → operations → wire requests                    |
//! | `diagnostics` | defensive list-index checks (structured warnings)       |
//!
//! The expected flow per local edit: the embedding layer produces a
//! before/after snapshot pair plus raw patches, `translate` folds them into
//! canonical operations (reconciling list edits), and replaying those
//! against an [`engine::ImmutableFragment`] batch yields the next tree,
//! the next path index, and the wire requests for the transport.

pub mod convert;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod index;
pub mod reconcile;
pub mod translate;
pub mod tree;

pub use convert::{doc_from_fragment, fragment_from_doc, fragment_from_doc_with_id};
pub use diagnostics::DiagnosticsConfig;
pub use engine::{
    DeletedFragment, ImmutableFragment, InsertedFragment, MovedFragment, ReplacedFragment,
};
pub use error::FragmentError;
pub use index::{build_path_index, FragmentIdToPath};
pub use reconcile::reconcile_list;
pub use translate::{apply_operations_to_fragment, local_patches_to_operations, AppliedOperations};
pub use tree::{FragmentNode, FragmentTree, NodeContent, ParentSlot};

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, FragmentError>;
