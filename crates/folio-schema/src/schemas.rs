//! Built-in structural schemas, one per document kind
//!
//! Schemas are deliberately permissive: they pin down the shape of the
//! fields this engine interprets (assets, layout, references, viz
//! settings, foreign keys) and leave everything else open, since document
//! content is an evolving bag of UI state. Compiled once at first use.

use crate::error::ValidationError;
use folio_document::DocumentKind;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;

static SCHEMAS: Lazy<HashMap<DocumentKind, JSONSchema>> = Lazy::new(|| {
    DocumentKind::ALL
        .iter()
        .map(|&kind| {
            let raw = raw_schema(kind);
            let compiled = JSONSchema::options()
                .with_draft(Draft::Draft7)
                .compile(&raw)
                .unwrap_or_else(|err| panic!("built-in {kind} schema does not compile: {err}"));
            (kind, compiled)
        })
        .collect()
});

// An id in content may be a number or a stringified number; the numeric
// normalization happens at read time, not here.
fn id_schema() -> Value {
    json!({ "type": ["integer", "string"] })
}

fn raw_schema(kind: DocumentKind) -> Value {
    match kind {
        DocumentKind::Question => json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "description": { "type": ["string", "null"] },
                "query": { "type": "string" },
                "vizSettings": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string" },
                        "pivotConfig": { "type": "object" }
                    }
                },
                "references": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": id_schema(),
                            "type": { "type": "string" }
                        },
                        "required": ["id"]
                    }
                }
            }
        }),
        DocumentKind::Dashboard | DocumentKind::Presentation | DocumentKind::Notebook => json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "description": { "type": ["string", "null"] },
                "assets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": { "type": "string" },
                            "id": id_schema()
                        },
                        "required": ["type"]
                    }
                },
                "layout": {
                    "type": "object",
                    "properties": {
                        "columns": { "type": "integer" },
                        "items": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "id": id_schema(),
                                    "x": { "type": "integer" },
                                    "y": { "type": "integer" },
                                    "w": { "type": "integer" },
                                    "h": { "type": "integer" }
                                }
                            }
                        }
                    }
                }
            }
        }),
        DocumentKind::Report => json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "description": { "type": ["string", "null"] },
                "references": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "reference": {
                                "type": "object",
                                "properties": {
                                    "id": id_schema(),
                                    "type": { "type": "string" }
                                },
                                "required": ["id"]
                            }
                        },
                        "required": ["reference"]
                    }
                }
            }
        }),
        DocumentKind::Alert => json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "questionId": id_schema(),
                "condition": { "type": "object" }
            }
        }),
    }
}

/// Check `content` against the structural schema for `kind`.
///
/// Returns the first schema violation, with the instance path as the
/// error location.
pub(crate) fn structural_check(kind: DocumentKind, content: &Value) -> Result<(), ValidationError> {
    let schema = &SCHEMAS[&kind];
    match schema.validate(content) {
        Ok(()) => Ok(()),
        Err(mut errors) => {
            let first = errors.next();
            let (location, detail) = first.map_or_else(
                || ("/".to_string(), "content does not match schema".to_string()),
                |err| {
                    let pointer = err.instance_path.to_string();
                    let location = if pointer.is_empty() { "/".to_string() } else { pointer };
                    (location, err.to_string())
                },
            );
            Err(ValidationError::schema(location, detail))
        }
    }
}
