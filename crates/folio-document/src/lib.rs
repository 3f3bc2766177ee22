//! Folio Document Model
//!
//! Identity, kind, and content primitives shared by every other crate.
//!
//! # Core Concepts
//!
//! - [`FileId`]: signed document id; positive ids are store-assigned,
//!   negative ids are client-minted placeholders for pending creations
//! - [`DocumentKind`]: the discriminated kinds a document can have
//! - [`merge_patch`]: the deep-merge used wherever a sparse patch meets
//!   content (arrays replace, objects merge, `null` is stored not deleted)
//! - [`diff_patch`]: the inverse, re-expressing an edited document as a
//!   sparse patch over its base
//! - [`IdMap`]: virtual → real id mapping produced by one batch-create
//!
//! Content itself is dynamic JSON (`serde_json::Value`); this crate never
//! interprets domain fields beyond ids and kind tags.

#![warn(unreachable_pub)]

mod diff;
mod id;
mod kind;
mod merge;

pub use diff::diff_patch;
pub use id::{FileId, IdMap};
pub use kind::{DocumentKind, UnknownKind};
pub use merge::merge_patch;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
