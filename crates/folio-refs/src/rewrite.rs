//! Reference traversal and id rewriting
//!
//! Pure functions over document content. The same slot traversal backs both
//! operations: swapping virtual ids for real ids during publish, and
//! scanning for virtual ids during the orchestrator's dangling-reference
//! preflight.

use crate::table::{reference_slots, RefSlot};
use folio_document::{DocumentKind, FileId, IdMap};
use serde_json::Value;
use std::collections::BTreeSet;

/// Return a deep copy of `content` with every reference-slot id found in
/// `id_map` replaced by its mapped real id.
///
/// Ids are compared numerically, so a stringified id (`"-3"`) matches its
/// numeric key; rewritten ids are always emitted as JSON numbers. Ids not
/// present in `id_map`, and every non-reference field, pass through
/// byte-for-byte.
#[must_use]
pub fn rewrite(content: &Value, kind: DocumentKind, id_map: &IdMap) -> Value {
    let mut rewritten = content.clone();
    if id_map.is_empty() {
        return rewritten;
    }
    visit_slots_mut(&mut rewritten, reference_slots(kind), &mut |cell| {
        if let Some(id) = FileId::from_value(cell) {
            if let Some(real) = id_map.get(&id) {
                *cell = real.to_value();
            }
        }
    });
    rewritten
}

/// Collect every virtual id referenced from `content`'s reference slots.
///
/// Ordered set so callers can report dangling references deterministically.
#[must_use]
pub fn collect_virtual_refs(content: &Value, kind: DocumentKind) -> BTreeSet<FileId> {
    let mut found = BTreeSet::new();
    visit_slots(content, reference_slots(kind), &mut |cell| {
        if let Some(id) = FileId::from_value(cell) {
            if id.is_virtual() {
                found.insert(id);
            }
        }
    });
    found
}

fn visit_slots<'a>(content: &'a Value, slots: &[RefSlot], visit: &mut dyn FnMut(&'a Value)) {
    for slot in slots {
        match slot {
            RefSlot::AssetList { guard } => {
                if let Some(assets) = content.get("assets").and_then(Value::as_array) {
                    for entry in assets {
                        if entry.get("type").and_then(Value::as_str) == Some(guard) {
                            if let Some(cell) = entry.get("id") {
                                visit(cell);
                            }
                        }
                    }
                }
            }
            RefSlot::LayoutItems => {
                let items = content
                    .get("layout")
                    .and_then(|layout| layout.get("items"))
                    .and_then(Value::as_array);
                if let Some(items) = items {
                    for item in items {
                        if let Some(cell) = item.get("id") {
                            visit(cell);
                        }
                    }
                }
            }
            RefSlot::ReferenceList => {
                if let Some(references) = content.get("references").and_then(Value::as_array) {
                    for entry in references {
                        if let Some(cell) = entry.get("id") {
                            visit(cell);
                        }
                    }
                }
            }
            RefSlot::WrappedReferenceList => {
                if let Some(references) = content.get("references").and_then(Value::as_array) {
                    for entry in references {
                        if let Some(cell) = entry.get("reference").and_then(|r| r.get("id")) {
                            visit(cell);
                        }
                    }
                }
            }
            RefSlot::ScalarKey { field } => {
                if let Some(cell) = content.get(*field) {
                    visit(cell);
                }
            }
        }
    }
}

fn visit_slots_mut(content: &mut Value, slots: &[RefSlot], visit: &mut dyn FnMut(&mut Value)) {
    for slot in slots {
        match slot {
            RefSlot::AssetList { guard } => {
                if let Some(assets) = content.get_mut("assets").and_then(Value::as_array_mut) {
                    for entry in assets {
                        if entry.get("type").and_then(Value::as_str) == Some(guard) {
                            if let Some(cell) = entry.get_mut("id") {
                                visit(cell);
                            }
                        }
                    }
                }
            }
            RefSlot::LayoutItems => {
                let items = content
                    .get_mut("layout")
                    .and_then(|layout| layout.get_mut("items"))
                    .and_then(Value::as_array_mut);
                if let Some(items) = items {
                    for item in items {
                        if let Some(cell) = item.get_mut("id") {
                            visit(cell);
                        }
                    }
                }
            }
            RefSlot::ReferenceList => {
                if let Some(references) = content.get_mut("references").and_then(Value::as_array_mut) {
                    for entry in references {
                        if let Some(cell) = entry.get_mut("id") {
                            visit(cell);
                        }
                    }
                }
            }
            RefSlot::WrappedReferenceList => {
                if let Some(references) = content.get_mut("references").and_then(Value::as_array_mut) {
                    for entry in references {
                        if let Some(cell) = entry.get_mut("reference").and_then(|r| r.get_mut("id")) {
                            visit(cell);
                        }
                    }
                }
            }
            RefSlot::ScalarKey { field } => {
                if let Some(cell) = content.get_mut(*field) {
                    visit(cell);
                }
            }
        }
    }
}
