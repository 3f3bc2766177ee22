//! Folio Schema Validation
//!
//! The validation boundary every edit passes through: fully merged content
//! is checked against the document kind's structural schema, then against
//! its semantic cross-field rules.
//!
//! # Core Concepts
//!
//! - [`validate`]: structural check, then semantic check; first failure wins
//! - [`ValidationError`]: structured value (never a panic) distinguishing
//!   [`ValidationKind::Schema`] from [`ValidationKind::Semantic`], carrying
//!   the violated rule and a pointer to the offending field
//! - Structural schemas are compiled once per kind (`jsonschema`) and stay
//!   permissive about fields this engine does not interpret
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_schema::validate;
//! use folio_document::DocumentKind;
//!
//! let err = validate(DocumentKind::Question, &merged).unwrap_err();
//! println!("{} broke {}", err.location, err.rule);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod rules;
mod schemas;

pub use error::{ValidationError, ValidationKind};
pub use rules::MIN_LAYOUT_UNITS;

use folio_document::DocumentKind;
use serde_json::Value;

/// Validate fully merged document content for `kind`.
///
/// Runs the structural schema first so semantic rules can assume the
/// shapes they inspect; returns the first violation found.
///
/// # Errors
///
/// [`ValidationError`] describing the first violated schema constraint or
/// semantic rule.
pub fn validate(kind: DocumentKind, content: &Value) -> Result<(), ValidationError> {
    schemas::structural_check(kind, content)?;
    rules::semantic_check(kind, content)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
