//! Error types for the session layer
//!
//! Covers the two failure surfaces:
//! - edit operations (unknown ids, bad patches, validation)
//! - the publish protocol (preflight rejections, store failures)

use crate::phase::IllegalTransition;
use folio_document::FileId;
use folio_schema::ValidationError;
use folio_store::StoreError;

/// Errors from `edit`, `edit_by_string_match`, and related mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// Target id is not tracked
    #[error("unknown document: {0}")]
    UnknownDocument(FileId),

    /// Patch was not a JSON object
    #[error("edit patch must be a json object")]
    NonObjectPatch,

    /// Merged content failed validation; the patch is stored but flagged
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// String match not found in the serialized content
    #[error("no match for '{0}' in document content")]
    MatchNotFound(String),

    /// String match hit more than once
    #[error("ambiguous match: '{pattern}' occurs {count} times")]
    AmbiguousMatch {
        /// The searched-for text.
        pattern: String,
        /// How many times it occurred.
        count: usize,
    },

    /// Content could not be serialized for matching
    #[error("content serialization failed: {0}")]
    Serialize(String),

    /// Replacement did not leave valid JSON object content
    #[error("replacement produced invalid content: {0}")]
    InvalidReplacement(String),
}

/// Errors from `publish_all` and `publish_file`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Dirty documents failed validation during preflight
    #[error("cannot publish: {} documents failed validation", failures.len())]
    Invalid {
        /// Offending documents with their first violation each.
        failures: Vec<(FileId, ValidationError)>,
    },

    /// A reference points at a virtual id this publish cannot resolve
    #[error("document {document} references virtual id {target}, which cannot be resolved by this publish")]
    DanglingReference {
        /// Document holding the reference.
        document: FileId,
        /// The referenced virtual id.
        target: FileId,
    },

    /// Dirty set exceeds the configured batch limit
    #[error("publish batch of {dirty} documents exceeds the configured maximum of {max}")]
    BatchTooLarge {
        /// Dirty documents collected.
        dirty: usize,
        /// Configured `max_batch_size`.
        max: usize,
    },

    /// Batch-create failed; nothing was persisted
    #[error("batch create failed: {0}")]
    CreateFailed(StoreError),

    /// Batch-save failed after documents were already created
    #[error("batch save failed after creating {created} documents: {source}")]
    SaveFailed {
        /// Documents created before the save failed. These are not rolled
        /// back; a retry skips their creation.
        created: usize,
        /// Underlying store failure.
        source: StoreError,
    },

    /// Another publish is already in flight on this session
    #[error("a publish is already in flight")]
    AlreadyPublishing,

    /// Single-file publish was asked to persist a virtual document
    #[error("document {0} only exists locally and must go through publish_all")]
    VirtualPublish(FileId),

    /// Target id is not tracked
    #[error("unknown document: {0}")]
    UnknownDocument(FileId),

    /// Publish phase machine misuse
    #[error(transparent)]
    Phase(#[from] IllegalTransition),
}

impl PublishError {
    /// Create a dangling-reference error
    pub fn dangling(document: FileId, target: FileId) -> Self {
        Self::DanglingReference { document, target }
    }

    /// Whether retrying the publish can succeed without other action
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CreateFailed(source) | Self::SaveFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Combined session error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Edit failure
    #[error("edit error: {0}")]
    Edit(#[from] EditError),

    /// Publish failure
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// Store failure outside a publish (loads)
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_error_display() {
        let err = EditError::UnknownDocument(FileId::from_raw(-4));
        assert_eq!(err.to_string(), "unknown document: -4");

        let err = EditError::AmbiguousMatch {
            pattern: "select 1".to_string(),
            count: 3,
        };
        assert_eq!(err.to_string(), "ambiguous match: 'select 1' occurs 3 times");
    }

    #[test]
    fn validation_error_passes_through() {
        let err: EditError = ValidationError::semantic(
            "pivot-config-required",
            "/vizSettings",
            "pivotConfig is required for pivot visualizations",
        )
        .into();
        assert!(err.to_string().contains("pivotConfig is required"));
    }

    #[test]
    fn publish_error_display() {
        let err = PublishError::dangling(FileId::from_raw(7), FileId::from_raw(-2));
        assert_eq!(
            err.to_string(),
            "document 7 references virtual id -2, which cannot be resolved by this publish"
        );

        let err = PublishError::SaveFailed {
            created: 2,
            source: StoreError::Transport("timeout".to_string()),
        };
        assert!(err.to_string().contains("after creating 2 documents"));
    }

    #[test]
    fn retryability_follows_store_error() {
        let transport = PublishError::CreateFailed(StoreError::Transport("down".to_string()));
        assert!(transport.is_retryable());

        let rejected = PublishError::CreateFailed(StoreError::Rejected("bad".to_string()));
        assert!(!rejected.is_retryable());

        assert!(!PublishError::AlreadyPublishing.is_retryable());
    }

    #[test]
    fn error_conversions() {
        let edit_err = EditError::NonObjectPatch;
        let session_err: SessionError = edit_err.into();
        assert!(matches!(session_err, SessionError::Edit(_)));
    }
}
