//! Validation error types
//!
//! Validation failures are values, not panics: an edit that produces
//! invalid merged content still lands in the tracker (the user's input is
//! preserved), and the error travels back to the caller so the UI can
//! surface the exact offending rule next to the field.

use serde::{Deserialize, Serialize};

/// Which class of check rejected the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    /// The content violates the kind's structural schema (wrong shape).
    Schema,
    /// The content violates a semantic cross-field rule.
    Semantic,
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationKind::Schema => f.write_str("schema"),
            ValidationKind::Semantic => f.write_str("semantic"),
        }
    }
}

/// A structured validation failure.
///
/// `location` is a JSON-pointer-style path into the merged content;
/// `detail` is the human-readable rule description, suitable for direct
/// display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} validation failed at {location}: {detail}")]
pub struct ValidationError {
    /// Schema or semantic.
    pub kind: ValidationKind,
    /// Short stable rule identifier (e.g. `pivot-config-required`).
    pub rule: String,
    /// Pointer to the offending field, `/` for the document root.
    pub location: String,
    /// Human-readable description of the violated rule.
    pub detail: String,
}

impl ValidationError {
    /// Structural schema failure.
    pub fn schema(location: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Schema,
            rule: "structural-schema".to_string(),
            location: location.into(),
            detail: detail.into(),
        }
    }

    /// Semantic rule failure.
    pub fn semantic(
        rule: impl Into<String>,
        location: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: ValidationKind::Semantic,
            rule: rule.into(),
            location: location.into(),
            detail: detail.into(),
        }
    }
}
