//! The fixed reference-shape table
//!
//! Every field that semantically "points at another document by id" is
//! enumerated here, per document kind. Extending the engine to a new kind
//! means extending this table; call sites never hand-roll traversal.

use folio_document::DocumentKind;

/// One place a document kind stores cross-document references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefSlot {
    /// `assets[].id`, counted only for entries whose `type` tag equals the
    /// guard (other asset kinds carry ids this engine does not manage).
    AssetList {
        /// Discriminator tag an entry must carry to be treated as a reference.
        guard: &'static str,
    },
    /// `layout.items[].id`; the layout grid mirrors the asset list.
    LayoutItems,
    /// `references[].id`.
    ReferenceList,
    /// `references[].reference.id`.
    WrappedReferenceList,
    /// A scalar foreign-key field at the document root.
    ScalarKey {
        /// Field name holding the id.
        field: &'static str,
    },
}

/// Reference slots for a document kind.
///
/// # Table
/// - `dashboard` / `presentation` / `notebook` → question-guarded asset
///   list + layout items
/// - `question` → flat reference list
/// - `report` → wrapped reference list
/// - `alert` → `questionId` scalar
#[inline]
#[must_use]
pub fn reference_slots(kind: DocumentKind) -> &'static [RefSlot] {
    match kind {
        DocumentKind::Dashboard | DocumentKind::Presentation | DocumentKind::Notebook => &[
            RefSlot::AssetList { guard: "question" },
            RefSlot::LayoutItems,
        ],
        DocumentKind::Question => &[RefSlot::ReferenceList],
        DocumentKind::Report => &[RefSlot::WrappedReferenceList],
        DocumentKind::Alert => &[RefSlot::ScalarKey { field: "questionId" }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_slots() {
        for kind in DocumentKind::ALL {
            assert!(!reference_slots(kind).is_empty(), "{kind} has no reference slots");
        }
    }

    #[test]
    fn grid_kinds_share_the_dashboard_shape() {
        assert_eq!(
            reference_slots(DocumentKind::Presentation),
            reference_slots(DocumentKind::Dashboard)
        );
        assert_eq!(
            reference_slots(DocumentKind::Notebook),
            reference_slots(DocumentKind::Dashboard)
        );
    }

    #[test]
    fn alert_is_a_scalar_key() {
        assert_eq!(
            reference_slots(DocumentKind::Alert),
            &[RefSlot::ScalarKey { field: "questionId" }]
        );
    }
}
