//! Tracked document state
//!
//! A [`DocumentRecord`] is one entry in the edit-state tracker: the last
//! persisted content plus a sparse patch of unsaved fields. Dirtiness is
//! keyed off patch key presence, never value truthiness, and virtual
//! documents are dirty by construction since their whole content is an
//! unsaved patch.

use folio_document::{merge_patch, DocumentKind, FileId};
use folio_schema::ValidationError;
use serde_json::{Map, Value};

/// Sparse JSON object patch, keyed by top-level field.
pub type PatchMap = Map<String, Value>;

/// One tracked document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Tracker key; negative while the document only exists locally.
    pub id: FileId,
    /// Document kind, fixed for the record's lifetime.
    pub kind: DocumentKind,
    /// Folder the document lives (or will live) under.
    pub path: String,
    /// Last known persisted content; empty object for virtual documents.
    pub base_content: Value,
    /// Unsaved fields. A key's presence makes the record dirty.
    pub pending_changes: PatchMap,
    /// Session-only state, never persisted and never dirtying.
    pub ephemeral_changes: PatchMap,
    /// Set while a publish is persisting this record.
    pub saving: bool,
    /// Why the latest edit failed validation, if it did.
    pub invalid_reason: Option<ValidationError>,
}

impl DocumentRecord {
    /// Record for a document fetched from the store, clean.
    #[must_use]
    pub fn loaded(id: FileId, kind: DocumentKind, path: impl Into<String>, content: Value) -> Self {
        Self {
            id,
            kind,
            path: path.into(),
            base_content: content,
            pending_changes: PatchMap::new(),
            ephemeral_changes: PatchMap::new(),
            saving: false,
            invalid_reason: None,
        }
    }

    /// Record for a freshly minted virtual document. The draft lands in
    /// `pending_changes` so the entire content counts as unsaved.
    #[must_use]
    pub fn virtual_draft(
        id: FileId,
        kind: DocumentKind,
        path: impl Into<String>,
        draft: PatchMap,
    ) -> Self {
        Self {
            id,
            kind,
            path: path.into(),
            base_content: Value::Object(Map::new()),
            pending_changes: draft,
            ephemeral_changes: PatchMap::new(),
            saving: false,
            invalid_reason: None,
        }
    }

    /// Whether the record has unsaved state.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.id.is_virtual() || !self.pending_changes.is_empty()
    }

    /// Whether the latest validated edit passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }

    /// Pending changes as a JSON patch value.
    #[must_use]
    pub fn pending_patch(&self) -> Value {
        Value::Object(self.pending_changes.clone())
    }

    /// Content as the UI sees it: base with pending changes merged on top.
    #[must_use]
    pub fn merged_content(&self) -> Value {
        if self.pending_changes.is_empty() {
            return self.base_content.clone();
        }
        merge_patch(&self.base_content, &self.pending_patch())
    }

    /// Merged content with ephemeral state layered on top, for execution
    /// surfaces only. Never persisted.
    #[must_use]
    pub fn execution_content(&self) -> Value {
        if self.ephemeral_changes.is_empty() {
            return self.merged_content();
        }
        merge_patch(
            &self.merged_content(),
            &Value::Object(self.ephemeral_changes.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(id: i64) -> DocumentRecord {
        DocumentRecord::loaded(
            FileId::from_raw(id),
            DocumentKind::Question,
            "questions",
            json!({ "name": "Q", "query": "select 1" }),
        )
    }

    #[test]
    fn loaded_record_is_clean() {
        let record = question(3);
        assert!(!record.is_dirty());
        assert_eq!(record.merged_content(), record.base_content);
    }

    #[test]
    fn pending_key_makes_record_dirty() {
        let mut record = question(3);
        record
            .pending_changes
            .insert("description".to_string(), json!("docs"));
        assert!(record.is_dirty());
        assert_eq!(record.merged_content()["description"], json!("docs"));
        assert_eq!(record.merged_content()["name"], json!("Q"));
    }

    #[test]
    fn null_pending_value_still_counts_as_dirty() {
        let mut record = question(3);
        record.pending_changes.insert("query".to_string(), Value::Null);
        assert!(record.is_dirty());
    }

    #[test]
    fn virtual_draft_is_dirty_even_when_empty() {
        let record = DocumentRecord::virtual_draft(
            FileId::from_raw(-1),
            DocumentKind::Question,
            "questions",
            PatchMap::new(),
        );
        assert!(record.is_dirty());
        assert_eq!(record.merged_content(), json!({}));
    }

    #[test]
    fn ephemeral_changes_never_dirty_or_merge() {
        let mut record = question(3);
        record
            .ephemeral_changes
            .insert("lastRun".to_string(), json!({ "rows": 10 }));
        assert!(!record.is_dirty());
        assert!(record.merged_content().get("lastRun").is_none());
        assert_eq!(record.execution_content()["lastRun"], json!({ "rows": 10 }));
    }
}
