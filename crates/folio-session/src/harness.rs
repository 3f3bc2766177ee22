//! Publish scenario harness
//!
//! Drives a full edit/publish round against the in-memory store: seed a
//! few questions and a dashboard, edit everything, draft new virtual
//! questions, wire them into the dashboard, publish, and check what the
//! store actually holds afterwards.
//!
//! Checks performed:
//! - every virtual draft came back with a real id
//! - no persisted document contains a virtual (negative) reference
//! - the tracker is clean after a successful publish
//! - create/save stay at one store call each, plus one save per retry

use crate::error::PublishError;
use crate::session::EditSession;
use folio_document::{DocumentKind, FileId};
use folio_refs::collect_virtual_refs;
use folio_store::MemoryStore;
use serde_json::json;
use std::sync::Arc;

/// Scenario configuration
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Questions seeded into the store before the session starts
    pub existing_questions: usize,
    /// Virtual question drafts created during the session
    pub virtual_questions: usize,
    /// Description edits applied to each loaded document
    pub edits_per_document: usize,
    /// Fail the first batch-save and verify the retry converges
    pub inject_save_failure: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            existing_questions: 2,
            virtual_questions: 1,
            edits_per_document: 1,
            inject_save_failure: false,
        }
    }
}

/// Counters accumulated while the scenario runs
#[derive(Debug, Clone, Default)]
pub struct ScenarioStats {
    /// Documents fetched into the session
    pub documents_loaded: usize,
    /// Virtual drafts the publish turned into real documents
    pub documents_created: usize,
    /// Real documents whose pending changes were persisted
    pub documents_saved: usize,
    /// Publish attempts replayed after an injected failure
    pub publish_retries: usize,
    /// Store load calls counted
    pub load_calls: usize,
    /// Store batch-create calls counted
    pub create_calls: usize,
    /// Store batch-save calls counted
    pub save_calls: usize,
    /// Documents still dirty once the scenario finished
    pub dirty_after_publish: usize,
    /// Virtual (negative) references found in persisted content
    pub virtual_refs_persisted: usize,
}

/// Final report from a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Configuration the scenario ran with
    pub config: ScenarioConfig,
    /// Counters accumulated along the way
    pub stats: ScenarioStats,
    /// Human-readable check failures, empty on success
    pub failures: Vec<String>,
}

impl ScenarioReport {
    /// Check if the scenario passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Folio Publish Scenario Report ===\n\n");
        report.push_str(&format!("Seeded Questions: {}\n", self.config.existing_questions));
        report.push_str(&format!("Virtual Questions: {}\n", self.config.virtual_questions));
        report.push_str(&format!("Edits Per Document: {}\n", self.config.edits_per_document));
        report.push_str(&format!(
            "Save Failure Injected: {}\n\n",
            if self.config.inject_save_failure { "yes" } else { "no" }
        ));
        report.push_str(&format!("Documents Loaded: {}\n", self.stats.documents_loaded));
        report.push_str(&format!("Documents Created: {}\n", self.stats.documents_created));
        report.push_str(&format!("Documents Saved: {}\n", self.stats.documents_saved));
        report.push_str(&format!("Publish Retries: {}\n", self.stats.publish_retries));
        report.push_str(&format!(
            "Store Calls: {} load / {} create / {} save\n",
            self.stats.load_calls, self.stats.create_calls, self.stats.save_calls
        ));
        report.push_str(&format!("Dirty After Publish: {}\n", self.stats.dirty_after_publish));
        report.push_str(&format!(
            "Virtual Refs Persisted: {} (SHOULD BE 0)\n",
            self.stats.virtual_refs_persisted
        ));
        report.push_str(&format!("Failures: {}\n", self.failures.len()));

        if !self.failures.is_empty() {
            report.push_str("\n=== Failures ===\n");
            for (i, failure) in self.failures.iter().enumerate() {
                report.push_str(&format!("{}. {}\n", i + 1, failure));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Run one edit/publish scenario against a fresh in-memory store.
pub async fn run_scenario(config: ScenarioConfig) -> ScenarioReport {
    let store = Arc::new(MemoryStore::new());
    let session = EditSession::new(store.clone());
    let mut stats = ScenarioStats::default();
    let mut failures = Vec::new();
    let seeded = config.existing_questions + 1;

    if let Err(reason) = drive(&config, &store, &session, &mut stats).await {
        failures.push(reason);
    }

    stats.load_calls = store.load_calls();
    stats.create_calls = store.create_calls();
    stats.save_calls = store.save_calls();
    stats.dirty_after_publish = session.list_dirty().len();
    stats.virtual_refs_persisted = count_virtual_refs(&store);

    check_expectations(&config, seeded, &store, &stats, &mut failures);

    ScenarioReport {
        config,
        stats,
        failures,
    }
}

async fn drive(
    config: &ScenarioConfig,
    store: &Arc<MemoryStore>,
    session: &EditSession,
    stats: &mut ScenarioStats,
) -> Result<(), String> {
    let question_ids: Vec<FileId> = (0..config.existing_questions)
        .map(|n| {
            store.seed(
                DocumentKind::Question,
                "questions",
                question_content(&format!("Seeded Question {}", n + 1)),
            )
        })
        .collect();
    let dashboard_id = store.seed(
        DocumentKind::Dashboard,
        "dashboards",
        dashboard_content(&question_ids),
    );

    let mut all_ids = question_ids.clone();
    all_ids.push(dashboard_id);
    session
        .load_many(all_ids.clone())
        .await
        .map_err(|err| format!("initial load failed: {err}"))?;
    stats.documents_loaded = all_ids.len();

    for &id in &all_ids {
        for edit in 0..config.edits_per_document {
            session
                .edit(id, json!({ "description": format!("pass {}", edit + 1) }))
                .map_err(|err| format!("edit of {id} failed: {err}"))?;
        }
    }

    if config.virtual_questions > 0 {
        let mut assets = asset_entries(&session, dashboard_id)?;
        let mut items = layout_items(&session, dashboard_id)?;
        for n in 0..config.virtual_questions {
            let draft = question_content(&format!("Draft Question {}", n + 1));
            let virtual_id = session.create_virtual(DocumentKind::Question, None, draft);
            assets.push(json!({ "type": "question", "id": virtual_id }));
            items.push(json!({
                "id": virtual_id,
                "x": 4 * (items.len() as i64),
                "y": 0,
                "w": 4,
                "h": 4
            }));
        }
        session
            .edit(
                dashboard_id,
                json!({
                    "assets": assets,
                    "layout": { "columns": 24, "items": items }
                }),
            )
            .map_err(|err| format!("wiring drafts into dashboard failed: {err}"))?;
    }

    let anything_dirty = !session.list_dirty().is_empty();
    if config.inject_save_failure && anything_dirty {
        store.fail_next_save();
        match session.publish_all().await {
            Ok(receipt) => {
                return Err(format!(
                    "publish succeeded despite injected save failure: {receipt:?}"
                ));
            }
            Err(PublishError::SaveFailed { created, .. }) => {
                stats.documents_created += created;
                stats.publish_retries += 1;
            }
            Err(other) => {
                return Err(format!("expected a save failure, got: {other}"));
            }
        }
    }

    let receipt = session
        .publish_all()
        .await
        .map_err(|err| format!("publish failed: {err}"))?;
    stats.documents_created += receipt.created.len();
    stats.documents_saved = receipt.saved.len();
    Ok(())
}

fn check_expectations(
    config: &ScenarioConfig,
    seeded: usize,
    store: &Arc<MemoryStore>,
    stats: &ScenarioStats,
    failures: &mut Vec<String>,
) {
    let persisted = store.len().saturating_sub(seeded);
    if stats.documents_created != config.virtual_questions {
        failures.push(format!(
            "expected {} created documents, publish reported {}",
            config.virtual_questions, stats.documents_created
        ));
    }
    if persisted != config.virtual_questions {
        failures.push(format!(
            "expected {} new documents in the store, found {}",
            config.virtual_questions, persisted
        ));
    }

    let dashboard_dirty = config.edits_per_document > 0 || config.virtual_questions > 0;
    let expected_saved = if config.edits_per_document > 0 {
        config.existing_questions + 1
    } else {
        usize::from(dashboard_dirty)
    };
    if stats.documents_saved != expected_saved {
        failures.push(format!(
            "expected {} saved documents, publish reported {}",
            expected_saved, stats.documents_saved
        ));
    }

    let expected_create_calls = usize::from(config.virtual_questions > 0);
    if stats.create_calls != expected_create_calls {
        failures.push(format!(
            "expected {} batch-create calls, store counted {}",
            expected_create_calls, stats.create_calls
        ));
    }
    let expected_save_calls = if expected_saved > 0 {
        1 + stats.publish_retries
    } else {
        0
    };
    if stats.save_calls != expected_save_calls {
        failures.push(format!(
            "expected {} batch-save calls, store counted {}",
            expected_save_calls, stats.save_calls
        ));
    }

    if stats.dirty_after_publish != 0 {
        failures.push(format!(
            "{} documents still dirty after publish",
            stats.dirty_after_publish
        ));
    }
    if stats.virtual_refs_persisted != 0 {
        failures.push(format!(
            "{} virtual references reached the store",
            stats.virtual_refs_persisted
        ));
    }
}

// MemoryStore assigns real ids sequentially from 1, so scanning the id
// range covers every document it holds.
fn count_virtual_refs(store: &Arc<MemoryStore>) -> usize {
    let mut found = 0;
    for raw in 1..=store.len() as i64 {
        if let Some(doc) = store.document(FileId::from_raw(raw)) {
            found += collect_virtual_refs(&doc.content, doc.kind).len();
        }
    }
    found
}

fn question_content(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "description": "from the scenario harness",
        "query": "select count(*) from orders",
        "vizSettings": { "type": "bar" }
    })
}

fn dashboard_content(question_ids: &[FileId]) -> serde_json::Value {
    let assets: Vec<serde_json::Value> = question_ids
        .iter()
        .map(|id| json!({ "type": "question", "id": id }))
        .collect();
    let items: Vec<serde_json::Value> = question_ids
        .iter()
        .enumerate()
        .map(|(n, id)| json!({ "id": id, "x": 4 * (n as i64), "y": 0, "w": 4, "h": 4 }))
        .collect();
    json!({
        "name": "Overview",
        "description": "from the scenario harness",
        "assets": assets,
        "layout": { "columns": 24, "items": items }
    })
}

fn asset_entries(session: &EditSession, id: FileId) -> Result<Vec<serde_json::Value>, String> {
    let merged = session
        .merged_content(id)
        .ok_or_else(|| format!("dashboard {id} is not tracked"))?;
    Ok(merged
        .get("assets")
        .and_then(|assets| assets.as_array())
        .cloned()
        .unwrap_or_default())
}

fn layout_items(session: &EditSession, id: FileId) -> Result<Vec<serde_json::Value>, String> {
    let merged = session
        .merged_content(id)
        .ok_or_else(|| format!("dashboard {id} is not tracked"))?;
    Ok(merged
        .pointer("/layout/items")
        .and_then(|items| items.as_array())
        .cloned()
        .unwrap_or_default())
}
