//! Document kinds
//!
//! The discriminated kinds a document record can carry. Discriminator tags
//! in content (asset lists, typed reference lists) use the same lowercase
//! names, so parsing and emission go through this one enum.

use serde::{Deserialize, Serialize};

/// Discriminated document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A single query with visualization settings.
    Question,
    /// A grid of question assets with layout.
    Dashboard,
    /// A long-form document with typed references.
    Report,
    /// A slide deck over question assets.
    Presentation,
    /// A cell-based notebook over question assets.
    Notebook,
    /// A trigger watching one question.
    Alert,
}

impl DocumentKind {
    /// All known kinds, in display order.
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::Question,
        DocumentKind::Dashboard,
        DocumentKind::Report,
        DocumentKind::Presentation,
        DocumentKind::Notebook,
        DocumentKind::Alert,
    ];

    /// Lowercase discriminator tag, as stored in content fields.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Question => "question",
            DocumentKind::Dashboard => "dashboard",
            DocumentKind::Report => "report",
            DocumentKind::Presentation => "presentation",
            DocumentKind::Notebook => "notebook",
            DocumentKind::Alert => "alert",
        }
    }

    /// Whether a discriminator tag names a known kind.
    #[inline]
    #[must_use]
    pub fn is_known_tag(tag: &str) -> bool {
        tag.parse::<DocumentKind>().is_ok()
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question" => Ok(DocumentKind::Question),
            "dashboard" => Ok(DocumentKind::Dashboard),
            "report" => Ok(DocumentKind::Report),
            "presentation" => Ok(DocumentKind::Presentation),
            "notebook" => Ok(DocumentKind::Notebook),
            "alert" => Ok(DocumentKind::Alert),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discriminator tag that names no known document kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document kind: {0}")]
pub struct UnknownKind(pub String);
