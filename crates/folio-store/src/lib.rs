//! Folio Document Store Seam
//!
//! The narrow contract the edit/publish engine consumes: batch create,
//! batch save, batch load. Everything else the real backend does (CRUD
//! routes, auth, collections) is out of scope here.
//!
//! # Core Concepts
//!
//! - [`DocumentStore`]: object-safe async trait, injected as
//!   `Arc<dyn DocumentStore>`
//! - [`MemoryStore`]: in-process backend with call counters and failure
//!   injection, used by tests and the demo harness
//! - [`HttpStore`]: thin `reqwest` client against the real API routes
//!
//! Batch calls are all-or-nothing: a response describes every submitted
//! item or the call fails as a whole. The publish protocol depends on
//! that: it issues at most one create and one save per pass.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod http;
mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use folio_document::{DocumentKind, FileId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One document as the store holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    /// Real id.
    pub id: FileId,
    /// Document kind.
    pub kind: DocumentKind,
    /// Folder/location within the store.
    pub path: String,
    /// Full persisted content.
    pub content: Value,
}

/// One pending creation in a batch-create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItem {
    /// The client-minted placeholder id, echoed back in the response.
    pub virtual_id: FileId,
    /// Kind of the new document.
    pub kind: DocumentKind,
    /// Target folder/location.
    pub path: String,
    /// Fully merged draft content.
    pub content: Value,
}

/// Store answer for one created document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDocument {
    /// The placeholder id from the request.
    pub virtual_id: FileId,
    /// The newly assigned real id.
    pub real_id: FileId,
    /// Content as persisted.
    pub persisted_content: Value,
}

/// One document's pending patch in a batch-save request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveItem {
    /// Real id of the document to patch.
    pub id: FileId,
    /// Sparse patch of changed fields.
    pub changes: Value,
}

/// Store answer for one saved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    /// Id from the request.
    pub id: FileId,
    /// Content as persisted after applying the patch.
    pub persisted_content: Value,
}

/// Errors from a store backend.
///
/// Cloneable so an in-flight load shared by several callers can hand the
/// same failure to each of them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The request never completed (network, timeout, 5xx).
    #[error("store transport error: {0}")]
    Transport(String),
    /// The store understood and refused the request.
    #[error("store rejected the request: {0}")]
    Rejected(String),
    /// One or more requested documents do not exist.
    #[error("documents not found: {}", format_ids(.0))]
    NotFound(Vec<FileId>),
    /// The response could not be decoded.
    #[error("store response malformed: {0}")]
    MalformedResponse(String),
}

impl StoreError {
    /// Whether retrying the identical call can reasonably succeed.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }
}

fn format_ids(ids: &[FileId]) -> String {
    let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
    rendered.join(", ")
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Document store collaborator.
///
/// Implementations must answer every submitted item or fail the call as a
/// whole; partial responses are a protocol violation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create every item in one round trip, assigning real ids.
    async fn batch_create(&self, items: Vec<CreateItem>) -> StoreResult<Vec<CreatedDocument>>;

    /// Apply every patch in one round trip.
    async fn batch_save(&self, items: Vec<SaveItem>) -> StoreResult<Vec<SavedDocument>>;

    /// Load every requested document, failing with
    /// [`StoreError::NotFound`] if any id is unknown.
    async fn load_many(&self, ids: Vec<FileId>) -> StoreResult<Vec<StoredDocument>>;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn not_found_lists_ids() {
        let err = StoreError::NotFound(vec![FileId::from_raw(3), FileId::from_raw(9)]);
        assert_eq!(err.to_string(), "documents not found: 3, 9");
    }

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(StoreError::Transport("timeout".into()).is_retryable());
        assert!(!StoreError::Rejected("bad request".into()).is_retryable());
        assert!(!StoreError::NotFound(vec![]).is_retryable());
        assert!(!StoreError::MalformedResponse("truncated".into()).is_retryable());
    }

    #[test]
    fn wire_types_use_camel_case() {
        let item = CreateItem {
            virtual_id: FileId::from_raw(-2),
            kind: DocumentKind::Question,
            path: "questions".to_string(),
            content: serde_json::json!({ "name": "Q" }),
        };
        let encoded = serde_json::to_value(&item).unwrap();
        assert_eq!(encoded["virtualId"], serde_json::json!(-2));
        assert_eq!(encoded["kind"], serde_json::json!("question"));
    }
}
