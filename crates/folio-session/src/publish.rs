//! Publish protocol
//!
//! `publish_all` persists every dirty document in a fixed sequence:
//! snapshot and preflight, one batch-create for virtual documents, a
//! local rewrite of virtual references through the resulting id map,
//! one batch-save for the rest, then clearing. The create and save are
//! each at most one store call regardless of how many documents are
//! dirty; the rewrite needs the complete id map before any save goes
//! out, so the batches cannot be split or streamed.
//!
//! Failure semantics: a create failure aborts before anything was
//! persisted and is plainly retryable. A save failure leaves the
//! created documents in place (they are already real, re-keyed in the
//! tracker) and the rewrite has already substituted their real ids
//! into the remaining pending changes, so a retry skips creation and
//! replays an identical save.
//!
//! Clearing diffs against the snapshot taken at collect time: a key is
//! cleared only if its pending value still equals the snapshot value,
//! so edits made while the batches were in flight stay dirty.

use crate::error::PublishError;
use crate::events::SessionEvent;
use crate::phase::{PhaseMachine, PublishPhase};
use crate::record::{DocumentRecord, PatchMap};
use crate::session::EditSession;
use folio_document::{FileId, IdMap};
use folio_refs::{collect_virtual_refs, rewrite};
use folio_store::{CreateItem, CreatedDocument, SaveItem, SavedDocument, StoreError};
use serde_json::Value;
use std::collections::HashSet;

/// Outcome of a successful publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Virtual ids mapped to their newly assigned real ids.
    pub created: IdMap,
    /// Real ids whose pending changes were persisted.
    pub saved: Vec<FileId>,
}

impl PublishReceipt {
    /// True when the publish had nothing to do.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.saved.is_empty()
    }

    /// Total documents persisted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created.len() + self.saved.len()
    }
}

impl EditSession {
    /// Persist every dirty document.
    ///
    /// Issues at most one batch-create and one batch-save; with nothing
    /// dirty it resolves without any store call.
    pub async fn publish_all(&self) -> Result<PublishReceipt, PublishError> {
        if !self.begin_publish() {
            return Err(PublishError::AlreadyPublishing);
        }
        let result = self.run_publish_all().await;
        self.end_publish();
        if let Err(err) = &result {
            self.notify(SessionEvent::PublishFailed {
                message: err.to_string(),
            });
        }
        result
    }

    /// Persist one real document's pending changes outside the batch
    /// flow. Virtual documents must go through [`Self::publish_all`].
    pub async fn publish_file(&self, id: FileId) -> Result<PublishReceipt, PublishError> {
        if !self.begin_publish() {
            return Err(PublishError::AlreadyPublishing);
        }
        let result = self.run_publish_file(id).await;
        self.end_publish();
        if let Err(err) = &result {
            self.notify(SessionEvent::PublishFailed {
                message: err.to_string(),
            });
        }
        result
    }

    async fn run_publish_all(&self) -> Result<PublishReceipt, PublishError> {
        let mut machine = PhaseMachine::new();
        self.advance(&mut machine, PublishPhase::Collecting)?;

        let snapshot = self.list_dirty();
        if snapshot.is_empty() {
            self.advance(&mut machine, PublishPhase::Idle)?;
            tracing::debug!(session = %self.id(), "publish no-op, nothing dirty");
            return Ok(PublishReceipt::default());
        }
        if snapshot.len() > self.config().max_batch_size {
            return Err(PublishError::BatchTooLarge {
                dirty: snapshot.len(),
                max: self.config().max_batch_size,
            });
        }
        preflight(&snapshot)?;

        let (to_create, to_update): (Vec<DocumentRecord>, Vec<DocumentRecord>) = snapshot
            .iter()
            .cloned()
            .partition(|record| record.id.is_virtual());
        let snapshot_ids: Vec<FileId> = snapshot.iter().map(|record| record.id).collect();
        self.set_saving(&snapshot_ids, true);
        tracing::info!(
            session = %self.id(),
            dirty = snapshot.len(),
            creating = to_create.len(),
            updating = to_update.len(),
            "publishing"
        );

        self.advance(&mut machine, PublishPhase::Creating)?;
        let created_docs = match self.create_batch(&to_create).await {
            Ok(docs) => docs,
            Err(err) => {
                tracing::error!(session = %self.id(), %err, "batch create failed");
                self.set_saving(&snapshot_ids, false);
                self.advance(&mut machine, PublishPhase::Failed)?;
                return Err(err);
            }
        };
        let id_map: IdMap = created_docs
            .iter()
            .map(|created| (created.virtual_id, created.real_id))
            .collect();
        // Created documents are fully persisted at this point. Re-key them
        // under their real ids now so a failed save leaves the tracker
        // classifying them as real on retry.
        self.rekey_created(&to_create, &created_docs);

        self.advance(&mut machine, PublishPhase::Rewriting)?;
        let to_update = self.rewrite_pending(to_update, &id_map);
        let save_items: Vec<SaveItem> = to_update
            .iter()
            .map(|record| SaveItem {
                id: record.id,
                changes: record.pending_patch(),
            })
            .collect();

        self.advance(&mut machine, PublishPhase::Saving)?;
        let saved_docs = if save_items.is_empty() {
            Vec::new()
        } else {
            match self.store().batch_save(save_items).await {
                Ok(saved) => saved,
                Err(err) => {
                    tracing::error!(
                        session = %self.id(),
                        %err,
                        created = id_map.len(),
                        "batch save failed, created documents stay persisted"
                    );
                    self.set_saving(&snapshot_ids, false);
                    self.advance(&mut machine, PublishPhase::Failed)?;
                    return Err(PublishError::SaveFailed {
                        created: id_map.len(),
                        source: err,
                    });
                }
            }
        };
        for record in &to_update {
            if !saved_docs.iter().any(|saved| saved.id == record.id) {
                self.set_saving(&snapshot_ids, false);
                self.advance(&mut machine, PublishPhase::Failed)?;
                return Err(PublishError::SaveFailed {
                    created: id_map.len(),
                    source: StoreError::MalformedResponse(format!(
                        "save response missing {}",
                        record.id
                    )),
                });
            }
        }

        self.advance(&mut machine, PublishPhase::Clearing)?;
        let saved_ids = self.clear_saved(&to_update, &saved_docs);
        self.advance(&mut machine, PublishPhase::Idle)?;

        self.notify(SessionEvent::Published {
            created: id_map.len(),
            saved: saved_ids.len(),
        });
        tracing::info!(
            session = %self.id(),
            created = id_map.len(),
            saved = saved_ids.len(),
            "publish complete"
        );
        Ok(PublishReceipt {
            created: id_map,
            saved: saved_ids,
        })
    }

    async fn run_publish_file(&self, id: FileId) -> Result<PublishReceipt, PublishError> {
        if id.is_virtual() {
            if self.is_tracked(id) {
                return Err(PublishError::VirtualPublish(id));
            }
            return Err(PublishError::UnknownDocument(id));
        }
        let Some(record) = self.record(id) else {
            return Err(PublishError::UnknownDocument(id));
        };
        if !record.is_dirty() {
            return Ok(PublishReceipt::default());
        }
        if let Err(err) = folio_schema::validate(record.kind, &record.merged_content()) {
            return Err(PublishError::Invalid {
                failures: vec![(id, err)],
            });
        }
        if let Some(target) = collect_virtual_refs(&record.merged_content(), record.kind)
            .into_iter()
            .next()
        {
            return Err(PublishError::dangling(id, target));
        }

        self.set_saving(&[id], true);
        let items = vec![SaveItem {
            id,
            changes: record.pending_patch(),
        }];
        let saved = match self.store().batch_save(items).await {
            Ok(saved) => saved,
            Err(err) => {
                self.set_saving(&[id], false);
                return Err(PublishError::SaveFailed {
                    created: 0,
                    source: err,
                });
            }
        };
        let Some(doc) = saved.into_iter().find(|saved| saved.id == id) else {
            self.set_saving(&[id], false);
            return Err(PublishError::SaveFailed {
                created: 0,
                source: StoreError::MalformedResponse(format!("save response missing {id}")),
            });
        };
        let saved_ids = self.clear_saved(std::slice::from_ref(&record), &[doc]);
        self.notify(SessionEvent::Published {
            created: 0,
            saved: saved_ids.len(),
        });
        Ok(PublishReceipt {
            created: IdMap::new(),
            saved: saved_ids,
        })
    }

    fn advance(&self, machine: &mut PhaseMachine, to: PublishPhase) -> Result<(), PublishError> {
        let from = machine.current();
        machine.advance(to)?;
        self.notify(SessionEvent::PhaseChanged { from, to });
        Ok(())
    }

    async fn create_batch(
        &self,
        to_create: &[DocumentRecord],
    ) -> Result<Vec<CreatedDocument>, PublishError> {
        if to_create.is_empty() {
            return Ok(Vec::new());
        }
        let items: Vec<CreateItem> = to_create
            .iter()
            .map(|record| CreateItem {
                virtual_id: record.id,
                kind: record.kind,
                path: record.path.clone(),
                content: record.merged_content(),
            })
            .collect();
        let created = self
            .store()
            .batch_create(items)
            .await
            .map_err(PublishError::CreateFailed)?;
        for record in to_create {
            if !created.iter().any(|c| c.virtual_id == record.id) {
                return Err(PublishError::CreateFailed(StoreError::MalformedResponse(
                    format!("create response missing {}", record.id),
                )));
            }
        }
        Ok(created)
    }

    fn rekey_created(&self, originals: &[DocumentRecord], created: &[CreatedDocument]) {
        if created.is_empty() {
            return;
        }
        self.with_state(|state| {
            for doc in created {
                let Some(original) = originals.iter().find(|r| r.id == doc.virtual_id) else {
                    continue;
                };
                let old = state.records.shift_remove(&doc.virtual_id);
                let mut record = DocumentRecord::loaded(
                    doc.real_id,
                    original.kind,
                    original.path.clone(),
                    doc.persisted_content.clone(),
                );
                if let Some(current) = old {
                    record.ephemeral_changes = current.ephemeral_changes;
                    record.pending_changes = current.pending_changes;
                    clear_persisted_keys(&mut record.pending_changes, &original.pending_changes);
                    if !record.pending_changes.is_empty() {
                        record.invalid_reason = current.invalid_reason;
                    }
                }
                state.records.insert(doc.real_id, record);
            }
        });
    }

    // Substitutes real ids into the snapshot records (the save payload and
    // the clearing baseline) and into the live tracker state, so pending
    // changes never hold a virtual id once its document has been created.
    fn rewrite_pending(
        &self,
        mut snapshot: Vec<DocumentRecord>,
        id_map: &IdMap,
    ) -> Vec<DocumentRecord> {
        if id_map.is_empty() {
            return snapshot;
        }
        for record in &mut snapshot {
            if let Value::Object(map) = rewrite(&record.pending_patch(), record.kind, id_map) {
                record.pending_changes = map;
            }
        }
        self.with_state(|state| {
            for record in &snapshot {
                let Some(live) = state.records.get_mut(&record.id) else {
                    continue;
                };
                if let Value::Object(map) = rewrite(&live.pending_patch(), live.kind, id_map) {
                    live.pending_changes = map;
                }
            }
        });
        snapshot
    }

    fn clear_saved(
        &self,
        originals: &[DocumentRecord],
        saved: &[SavedDocument],
    ) -> Vec<FileId> {
        let mut cleared = Vec::with_capacity(saved.len());
        self.with_state(|state| {
            for doc in saved {
                let Some(original) = originals.iter().find(|r| r.id == doc.id) else {
                    continue;
                };
                let Some(record) = state.records.get_mut(&doc.id) else {
                    continue;
                };
                record.base_content = doc.persisted_content.clone();
                clear_persisted_keys(&mut record.pending_changes, &original.pending_changes);
                record.saving = false;
                if record.pending_changes.is_empty() {
                    record.invalid_reason = None;
                }
                cleared.push(doc.id);
            }
        });
        cleared
    }

    fn set_saving(&self, ids: &[FileId], saving: bool) {
        self.with_state(|state| {
            for id in ids {
                if let Some(record) = state.records.get_mut(id) {
                    record.saving = saving;
                }
            }
        });
    }
}

// A key is cleared only when its current value still equals the snapshot
// value; anything edited while the publish was in flight stays pending.
fn clear_persisted_keys(current: &mut PatchMap, snapshot: &PatchMap) {
    let persisted: Vec<String> = current
        .iter()
        .filter(|(key, value)| snapshot.get(*key) == Some(*value))
        .map(|(key, _)| key.clone())
        .collect();
    for key in persisted {
        current.remove(&key);
    }
}

fn preflight(snapshot: &[DocumentRecord]) -> Result<(), PublishError> {
    let mut failures = Vec::new();
    for record in snapshot {
        if let Err(err) = folio_schema::validate(record.kind, &record.merged_content()) {
            failures.push((record.id, err));
        }
    }
    if !failures.is_empty() {
        return Err(PublishError::Invalid { failures });
    }

    let batch_virtuals: HashSet<FileId> = snapshot
        .iter()
        .filter(|record| record.id.is_virtual())
        .map(|record| record.id)
        .collect();
    for record in snapshot {
        for target in collect_virtual_refs(&record.merged_content(), record.kind) {
            // Virtual documents go out as literal create payloads and are
            // never rewritten, so they may not reference other virtual ids.
            if record.id.is_virtual() || !batch_virtuals.contains(&target) {
                return Err(PublishError::dangling(record.id, target));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_document::DocumentKind;
    use serde_json::json;

    fn dirty_question(id: i64, name: &str) -> DocumentRecord {
        let mut record = DocumentRecord::loaded(
            FileId::from_raw(id),
            DocumentKind::Question,
            "questions",
            json!({ "name": name }),
        );
        record
            .pending_changes
            .insert("description".to_string(), json!("edited"));
        record
    }

    fn dirty_dashboard(id: i64, asset_id: i64) -> DocumentRecord {
        let mut record = DocumentRecord::loaded(
            FileId::from_raw(id),
            DocumentKind::Dashboard,
            "dashboards",
            json!({ "name": "D" }),
        );
        record.pending_changes.insert(
            "assets".to_string(),
            json!([{ "type": "question", "id": asset_id }]),
        );
        record
    }

    #[test]
    fn empty_receipt_is_a_noop() {
        let receipt = PublishReceipt::default();
        assert!(receipt.is_noop());
        assert_eq!(receipt.total(), 0);
    }

    #[test]
    fn preflight_accepts_virtual_refs_within_the_batch() {
        let mut snapshot = vec![dirty_dashboard(7, -1)];
        let draft = DocumentRecord::virtual_draft(
            FileId::from_raw(-1),
            DocumentKind::Question,
            "questions",
            json!({ "name": "V" }).as_object().cloned().unwrap_or_default(),
        );
        snapshot.push(draft);
        assert!(preflight(&snapshot).is_ok());
    }

    #[test]
    fn preflight_rejects_refs_to_virtual_ids_outside_the_batch() {
        let snapshot = vec![dirty_dashboard(7, -9)];
        let err = preflight(&snapshot).unwrap_err();
        assert_eq!(
            err,
            PublishError::dangling(FileId::from_raw(7), FileId::from_raw(-9))
        );
    }

    #[test]
    fn preflight_rejects_virtual_documents_referencing_virtual_ids() {
        let mut draft_dashboard = DocumentRecord::virtual_draft(
            FileId::from_raw(-2),
            DocumentKind::Dashboard,
            "dashboards",
            PatchMap::new(),
        );
        draft_dashboard.pending_changes.insert(
            "assets".to_string(),
            json!([{ "type": "question", "id": -3 }]),
        );
        let draft_question = DocumentRecord::virtual_draft(
            FileId::from_raw(-3),
            DocumentKind::Question,
            "questions",
            PatchMap::new(),
        );
        let err = preflight(&[draft_dashboard, draft_question]).unwrap_err();
        assert_eq!(
            err,
            PublishError::dangling(FileId::from_raw(-2), FileId::from_raw(-3))
        );
    }

    #[test]
    fn preflight_collects_every_invalid_document() {
        let mut bad_layout = dirty_dashboard(4, 1);
        bad_layout.pending_changes.insert(
            "layout".to_string(),
            json!({ "columns": 12, "items": [{ "id": 1, "x": 0, "y": 0, "w": 1, "h": 4 }] }),
        );
        let mut bad_pivot = dirty_question(5, "Q");
        bad_pivot.pending_changes.insert(
            "vizSettings".to_string(),
            json!({ "type": "pivot" }),
        );
        let err = preflight(&[bad_layout, bad_pivot]).unwrap_err();
        let PublishError::Invalid { failures } = err else {
            panic!("expected validation failure");
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].0, FileId::from_raw(4));
        assert_eq!(failures[1].0, FileId::from_raw(5));
    }

    #[test]
    fn snapshot_diff_clears_only_unchanged_keys() {
        let mut current = PatchMap::new();
        current.insert("a".to_string(), json!(1));
        current.insert("b".to_string(), json!("changed"));
        current.insert("c".to_string(), json!(true));

        let mut snapshot = PatchMap::new();
        snapshot.insert("a".to_string(), json!(1));
        snapshot.insert("b".to_string(), json!("original"));

        clear_persisted_keys(&mut current, &snapshot);
        assert!(current.get("a").is_none());
        assert_eq!(current.get("b"), Some(&json!("changed")));
        assert_eq!(current.get("c"), Some(&json!(true)));
    }
}
