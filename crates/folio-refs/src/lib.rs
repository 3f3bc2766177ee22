//! Folio Reference Rewriting
//!
//! Cross-document references (asset lists, layout grids, typed reference
//! lists, scalar foreign keys) may legally hold virtual (negative) ids
//! while the referenced document is still pending creation. This crate
//! owns the fixed table of where those references live per document kind,
//! and the pure traversals over it.
//!
//! # Core Concepts
//!
//! - [`reference_slots`]: the per-kind table of reference shapes
//! - [`rewrite`]: deep-copy content with mapped virtual ids swapped for
//!   real ids (numeric comparison, numeric emission)
//! - [`collect_virtual_refs`]: scan content for virtual ids, used by the
//!   publish preflight to detect dangling references

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod rewrite;
mod table;

pub use rewrite::{collect_virtual_refs, rewrite};
pub use table::{reference_slots, RefSlot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
