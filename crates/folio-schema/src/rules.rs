//! Semantic cross-field rules
//!
//! Checks that cannot be expressed structurally: configuration objects
//! required by a visualization type, grid-size minimums, and discriminator
//! tags that must name a known document kind. Each rule has a stable
//! identifier so the UI can map it to inline messaging.

use crate::error::ValidationError;
use folio_document::DocumentKind;
use serde_json::Value;

/// Minimum width/height of a layout item, in grid units.
pub const MIN_LAYOUT_UNITS: i64 = 3;

/// Check the semantic rules registered for `kind` against fully merged
/// content. Returns the first violated rule.
pub(crate) fn semantic_check(kind: DocumentKind, content: &Value) -> Result<(), ValidationError> {
    match kind {
        DocumentKind::Question => {
            check_pivot_config(content)?;
            check_reference_tags(content.get("references"), "/references")
        }
        DocumentKind::Dashboard | DocumentKind::Presentation | DocumentKind::Notebook => {
            check_asset_tags(content)?;
            check_layout_minimums(content)
        }
        DocumentKind::Report => check_report_reference_tags(content),
        DocumentKind::Alert => Ok(()),
    }
}

fn check_pivot_config(content: &Value) -> Result<(), ValidationError> {
    let viz = content.get("vizSettings");
    let is_pivot = viz
        .and_then(|v| v.get("type"))
        .and_then(Value::as_str)
        .is_some_and(|t| t == "pivot");
    if !is_pivot {
        return Ok(());
    }

    let Some(config) = viz.and_then(|v| v.get("pivotConfig")).filter(|c| c.is_object()) else {
        return Err(ValidationError::semantic(
            "pivot-config-required",
            "/vizSettings/pivotConfig",
            "pivotConfig is required for pivot visualizations",
        ));
    };

    for part in ["rows", "columns", "values"] {
        if config.get(part).is_none() {
            return Err(ValidationError::semantic(
                "pivot-config-complete",
                format!("/vizSettings/pivotConfig/{part}"),
                format!("pivotConfig must define rows, columns, and values (missing {part})"),
            ));
        }
    }
    Ok(())
}

fn check_layout_minimums(content: &Value) -> Result<(), ValidationError> {
    let Some(items) = content
        .get("layout")
        .and_then(|l| l.get("items"))
        .and_then(Value::as_array)
    else {
        return Ok(());
    };

    for (index, item) in items.iter().enumerate() {
        for (axis, label) in [("w", "width"), ("h", "height")] {
            if let Some(units) = item.get(axis).and_then(Value::as_i64) {
                if units < MIN_LAYOUT_UNITS {
                    return Err(ValidationError::semantic(
                        "layout-min-size",
                        format!("/layout/items/{index}/{axis}"),
                        format!(
                            "layout item {label} must be at least {MIN_LAYOUT_UNITS} grid units (got {units})"
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_asset_tags(content: &Value) -> Result<(), ValidationError> {
    let Some(assets) = content.get("assets").and_then(Value::as_array) else {
        return Ok(());
    };
    for (index, asset) in assets.iter().enumerate() {
        check_tag(asset.get("type"), &format!("/assets/{index}/type"))?;
    }
    Ok(())
}

fn check_reference_tags(references: Option<&Value>, base: &str) -> Result<(), ValidationError> {
    let Some(references) = references.and_then(Value::as_array) else {
        return Ok(());
    };
    for (index, entry) in references.iter().enumerate() {
        check_tag(entry.get("type"), &format!("{base}/{index}/type"))?;
    }
    Ok(())
}

fn check_report_reference_tags(content: &Value) -> Result<(), ValidationError> {
    let Some(references) = content.get("references").and_then(Value::as_array) else {
        return Ok(());
    };
    for (index, entry) in references.iter().enumerate() {
        let tag = entry.get("reference").and_then(|r| r.get("type"));
        check_tag(tag, &format!("/references/{index}/reference/type"))?;
    }
    Ok(())
}

fn check_tag(tag: Option<&Value>, location: &str) -> Result<(), ValidationError> {
    // Non-string tags are the structural schema's problem.
    if let Some(tag) = tag.and_then(Value::as_str) {
        if !DocumentKind::is_known_tag(tag) {
            return Err(ValidationError::semantic(
                "known-kind-tag",
                location,
                format!("unknown document kind tag: '{tag}'"),
            ));
        }
    }
    Ok(())
}
