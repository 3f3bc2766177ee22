//! Document identifiers
//!
//! A document id is a single signed integer with a sign convention:
//! positive ids are assigned by the document store, negative ids are
//! client-minted placeholders for documents that do not exist yet.
//! Zero is unused.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of a document, real or virtual.
///
/// Real ids (`> 0`) come from the document store. Virtual ids (`< 0`) are
/// minted client-side for not-yet-created documents and never reach the
/// store; they are replaced by real ids during publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(i64);

impl FileId {
    /// Wrap a raw id value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw signed value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// True for client-minted placeholder ids.
    #[inline]
    #[must_use]
    pub const fn is_virtual(self) -> bool {
        self.0 < 0
    }

    /// True for store-assigned ids.
    #[inline]
    #[must_use]
    pub const fn is_real(self) -> bool {
        self.0 > 0
    }

    /// Read an id out of a JSON value.
    ///
    /// Accepts both a JSON number and a stringified number: some upstream
    /// mutation paths store layout-item ids as strings, so reference fields
    /// must be compared numerically regardless of carrier type.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if let Some(n) = value.as_i64() {
            return Some(Self(n));
        }
        value
            .as_str()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(Self)
    }

    /// Canonical JSON representation: always a number.
    #[inline]
    #[must_use]
    pub fn to_value(self) -> serde_json::Value {
        serde_json::Value::from(self.0)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FileId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Mapping from virtual ids to the real ids one batch-create assigned.
///
/// Produced by a single batch-create response, consumed by exactly one
/// publish pass, never persisted.
pub type IdMap = HashMap<FileId, FileId>;
