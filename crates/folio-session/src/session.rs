//! Edit session: the tracker and virtual document allocator
//!
//! An [`EditSession`] owns the in-memory table of tracked documents and
//! every local mutation path: loads (deduplicated against concurrent
//! requests for the same id), edits, ephemeral state, discards, and
//! virtual document allocation. The publish protocol lives in the
//! `publish` module and drives the same table.
//!
//! All tracker mutation is synchronous under one mutex; the lock is
//! never held across an await point.

use crate::config::SessionConfig;
use crate::error::{EditError, SessionError, SessionResult};
use crate::events::{EventEnvelope, EventSink, SessionEvent, TracingSink};
use crate::record::{DocumentRecord, PatchMap};
use chrono::Utc;
use folio_document::{diff_patch, merge_patch, DocumentKind, FileId};
use folio_schema::ValidationError;
use folio_store::{DocumentStore, StoreError, StoredDocument};
use futures::future::Shared;
use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

type SharedLoad = Shared<futures::future::BoxFuture<'static, Result<StoredDocument, StoreError>>>;

/// Load lifecycle of one id, as seen by the session.
///
/// Records carry content only; fetch progress and the most recent fetch
/// failure are session-side state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Never requested and not tracked.
    Untracked,
    /// A fetch for this id is in flight.
    Loading,
    /// Tracked with known content.
    Loaded,
    /// The most recent fetch failed and no record exists.
    Failed(String),
}

/// Insertion-ordered tracker table.
pub(crate) struct TrackerState {
    pub(crate) records: IndexMap<FileId, DocumentRecord>,
}

/// One edit session over a document store.
pub struct EditSession {
    id: Uuid,
    config: SessionConfig,
    store: Arc<dyn DocumentStore>,
    events: Arc<dyn EventSink>,
    state: Mutex<TrackerState>,
    in_flight: Mutex<HashMap<FileId, SharedLoad>>,
    load_failures: Mutex<HashMap<FileId, String>>,
    next_virtual: AtomicI64,
    publishing: AtomicBool,
}

impl EditSession {
    /// Session with default configuration and a tracing event sink.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    /// Session with explicit configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn DocumentStore>, config: SessionConfig) -> Self {
        Self::with_events(store, config, Arc::new(TracingSink))
    }

    /// Session with an injected event sink.
    #[must_use]
    pub fn with_events(
        store: Arc<dyn DocumentStore>,
        config: SessionConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            store,
            events,
            state: Mutex::new(TrackerState {
                records: IndexMap::new(),
            }),
            in_flight: Mutex::new(HashMap::new()),
            load_failures: Mutex::new(HashMap::new()),
            next_virtual: AtomicI64::new(-1),
            publishing: AtomicBool::new(false),
        }
    }

    /// Unique id of this session.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut TrackerState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        self.events.emit(EventEnvelope {
            session: self.id,
            at: Utc::now(),
            event,
        });
    }

    pub(crate) fn begin_publish(&self) -> bool {
        !self.publishing.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn end_publish(&self) {
        self.publishing.store(false, Ordering::SeqCst);
    }

    /// Load one document, fetching it if the tracker does not hold it.
    ///
    /// Idempotent; concurrent loads for the same id share one fetch.
    pub async fn load(&self, id: FileId) -> SessionResult<FileId> {
        self.load_many(vec![id]).await?;
        Ok(id)
    }

    /// Load a set of documents with at most one store call for the ones
    /// not already tracked or in flight.
    pub async fn load_many(&self, ids: Vec<FileId>) -> SessionResult<()> {
        let mut unique: Vec<FileId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        // virtual ids never exist server-side
        if let Some(missing_virtual) = unique
            .iter()
            .copied()
            .find(|id| id.is_virtual() && !self.is_tracked(*id))
        {
            return Err(SessionError::Store(StoreError::NotFound(vec![
                missing_virtual,
            ])));
        }

        let mut waiters: Vec<(FileId, SharedLoad)> = Vec::new();
        {
            let state = self.state.lock();
            let mut in_flight = self.in_flight.lock();
            let missing: Vec<FileId> = unique
                .iter()
                .copied()
                .filter(|id| !state.records.contains_key(id) && !in_flight.contains_key(id))
                .collect();
            if !missing.is_empty() {
                let store = Arc::clone(&self.store);
                let batch_ids = missing.clone();
                let batch = async move { store.load_many(batch_ids).await }.boxed().shared();
                for id in missing {
                    let batch = batch.clone();
                    let single: SharedLoad = async move {
                        batch.await.and_then(|docs| {
                            docs.into_iter()
                                .find(|doc| doc.id == id)
                                .ok_or(StoreError::NotFound(vec![id]))
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(id, single);
                }
            }
            for id in &unique {
                if let Some(shared) = in_flight.get(id) {
                    waiters.push((*id, shared.clone()));
                }
            }
        }

        // Every waiter is drained even after a failure, so no resolved
        // future lingers in the in-flight table and a retry refetches.
        let mut first_err: Option<StoreError> = None;
        for (id, shared) in waiters {
            let result = shared.await;
            self.in_flight.lock().remove(&id);
            match result {
                Ok(doc) => {
                    self.load_failures.lock().remove(&id);
                    let inserted = self.with_state(|state| {
                        if state.records.contains_key(&id) {
                            false
                        } else {
                            state.records.insert(
                                id,
                                DocumentRecord::loaded(doc.id, doc.kind, doc.path, doc.content),
                            );
                            true
                        }
                    });
                    if inserted {
                        self.notify(SessionEvent::DocumentLoaded { id });
                    }
                }
                Err(err) => {
                    tracing::warn!(session = %self.id, %id, %err, "document load failed");
                    self.load_failures.lock().insert(id, err.to_string());
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        match first_err {
            Some(err) => Err(SessionError::Store(err)),
            None => Ok(()),
        }
    }

    /// Deep-merge `patch` into the document's pending changes.
    ///
    /// The merged content is revalidated; an invalid result is kept (the
    /// user's input survives) but flagged, and the error is returned.
    pub fn edit(&self, id: FileId, patch: Value) -> Result<(), EditError> {
        let Value::Object(patch) = patch else {
            return Err(EditError::NonObjectPatch);
        };
        let validate = self.config.validate_on_edit;
        let outcome = self.with_state(|state| {
            let Some(record) = state.records.get_mut(&id) else {
                return Err(EditError::UnknownDocument(id));
            };
            if let Value::Object(merged) =
                merge_patch(&record.pending_patch(), &Value::Object(patch))
            {
                record.pending_changes = merged;
            }
            Ok(revalidate(record, validate))
        });
        self.finish_edit(id, outcome)
    }

    /// Find/replace edit over the serialized merged content.
    ///
    /// The match must be unique. The resulting content is re-diffed
    /// against the base, so fields the replacement removed become
    /// explicit null entries in the pending patch.
    pub fn edit_by_string_match(
        &self,
        id: FileId,
        old_match: &str,
        new_match: &str,
    ) -> Result<(), EditError> {
        if old_match.is_empty() {
            return Err(EditError::MatchNotFound(String::new()));
        }
        let validate = self.config.validate_on_edit;
        let outcome = self.with_state(|state| {
            let Some(record) = state.records.get_mut(&id) else {
                return Err(EditError::UnknownDocument(id));
            };
            let serialized = serde_json::to_string(&record.merged_content())
                .map_err(|err| EditError::Serialize(err.to_string()))?;
            let count = serialized.matches(old_match).count();
            if count == 0 {
                return Err(EditError::MatchNotFound(old_match.to_string()));
            }
            if count > 1 {
                return Err(EditError::AmbiguousMatch {
                    pattern: old_match.to_string(),
                    count,
                });
            }
            let replaced = serialized.replacen(old_match, new_match, 1);
            let reparsed: Value = serde_json::from_str(&replaced)
                .map_err(|err| EditError::InvalidReplacement(err.to_string()))?;
            if !reparsed.is_object() {
                return Err(EditError::InvalidReplacement(
                    "content must remain a json object".to_string(),
                ));
            }
            if let Value::Object(patch) = diff_patch(&record.base_content, &reparsed) {
                record.pending_changes = patch;
            }
            Ok(revalidate(record, validate))
        });
        self.finish_edit(id, outcome)
    }

    fn finish_edit(
        &self,
        id: FileId,
        outcome: Result<Option<ValidationError>, EditError>,
    ) -> Result<(), EditError> {
        match outcome {
            Err(err) => Err(err),
            Ok(None) => {
                self.notify(SessionEvent::DocumentEdited { id, valid: true });
                Ok(())
            }
            Ok(Some(err)) => {
                self.notify(SessionEvent::DocumentEdited { id, valid: false });
                Err(EditError::Validation(err))
            }
        }
    }

    /// Discard pending changes. A virtual document is removed outright
    /// and its id is never reissued.
    pub fn clear_changes(&self, id: FileId) -> Result<(), EditError> {
        let removed = self.with_state(|state| {
            if id.is_virtual() {
                if state.records.shift_remove(&id).is_none() {
                    return Err(EditError::UnknownDocument(id));
                }
                Ok(true)
            } else {
                let Some(record) = state.records.get_mut(&id) else {
                    return Err(EditError::UnknownDocument(id));
                };
                record.pending_changes.clear();
                record.invalid_reason = None;
                Ok(false)
            }
        })?;
        self.notify(SessionEvent::ChangesCleared { id, removed });
        Ok(())
    }

    /// Merge session-only state for a document. Never persisted, never
    /// counts toward dirtiness, not validated.
    pub fn set_ephemeral(&self, id: FileId, patch: Value) -> Result<(), EditError> {
        let Value::Object(patch) = patch else {
            return Err(EditError::NonObjectPatch);
        };
        self.with_state(|state| {
            let Some(record) = state.records.get_mut(&id) else {
                return Err(EditError::UnknownDocument(id));
            };
            if let Value::Object(merged) = merge_patch(
                &Value::Object(record.ephemeral_changes.clone()),
                &Value::Object(patch),
            ) {
                record.ephemeral_changes = merged;
            }
            Ok(())
        })
    }

    /// Drop a document's session-only state.
    pub fn clear_ephemeral(&self, id: FileId) -> Result<(), EditError> {
        self.with_state(|state| {
            let Some(record) = state.records.get_mut(&id) else {
                return Err(EditError::UnknownDocument(id));
            };
            record.ephemeral_changes.clear();
            Ok(())
        })
    }

    /// Allocate a virtual document with a fresh negative id.
    ///
    /// Ids decrease monotonically and are never reissued within the
    /// session, including after discards and publishes. A non-object
    /// draft starts the document empty.
    pub fn create_virtual(&self, kind: DocumentKind, folder: Option<&str>, draft: Value) -> FileId {
        let id = FileId::from_raw(self.next_virtual.fetch_sub(1, Ordering::SeqCst));
        let path = folder.unwrap_or(&self.config.default_folder).to_string();
        let draft = match draft {
            Value::Object(map) => map,
            _ => PatchMap::new(),
        };
        self.with_state(|state| {
            state
                .records
                .insert(id, DocumentRecord::virtual_draft(id, kind, path, draft));
        });
        self.notify(SessionEvent::VirtualCreated { id, kind });
        id
    }

    /// Whether the tracker holds a record for `id`.
    #[must_use]
    pub fn is_tracked(&self, id: FileId) -> bool {
        self.with_state(|state| state.records.contains_key(&id))
    }

    /// Whether the document has unsaved state. False for untracked ids.
    #[must_use]
    pub fn is_dirty(&self, id: FileId) -> bool {
        self.with_state(|state| state.records.get(&id).is_some_and(|r| r.is_dirty()))
    }

    /// Snapshot of one record.
    #[must_use]
    pub fn record(&self, id: FileId) -> Option<DocumentRecord> {
        self.with_state(|state| state.records.get(&id).cloned())
    }

    /// Merged content of one record.
    #[must_use]
    pub fn merged_content(&self, id: FileId) -> Option<Value> {
        self.with_state(|state| state.records.get(&id).map(DocumentRecord::merged_content))
    }

    /// Merged content with ephemeral state layered on top. Execution-only
    /// view; never what publish sends.
    #[must_use]
    pub fn execution_content(&self, id: FileId) -> Option<Value> {
        self.with_state(|state| state.records.get(&id).map(DocumentRecord::execution_content))
    }

    /// Where `id` stands in the load lifecycle.
    #[must_use]
    pub fn load_state(&self, id: FileId) -> LoadState {
        if self.in_flight.lock().contains_key(&id) {
            return LoadState::Loading;
        }
        if self.is_tracked(id) {
            return LoadState::Loaded;
        }
        if let Some(message) = self.load_failures.lock().get(&id) {
            return LoadState::Failed(message.clone());
        }
        LoadState::Untracked
    }

    /// All dirty records, in tracker insertion order.
    #[must_use]
    pub fn list_dirty(&self) -> Vec<DocumentRecord> {
        self.with_state(|state| {
            state
                .records
                .values()
                .filter(|record| record.is_dirty())
                .cloned()
                .collect()
        })
    }

    /// Every tracked id, in insertion order.
    #[must_use]
    pub fn tracked_ids(&self) -> Vec<FileId> {
        self.with_state(|state| state.records.keys().copied().collect())
    }

    /// Number of dirty documents.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.with_state(|state| {
            state
                .records
                .values()
                .filter(|record| record.is_dirty())
                .count()
        })
    }

    /// Number of tracked documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_state(|state| state.records.len())
    }

    /// Whether the tracker is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn revalidate(record: &mut DocumentRecord, enabled: bool) -> Option<ValidationError> {
    if !enabled {
        record.invalid_reason = None;
        return None;
    }
    match folio_schema::validate(record.kind, &record.merged_content()) {
        Ok(()) => {
            record.invalid_reason = None;
            None
        }
        Err(err) => {
            record.invalid_reason = Some(err.clone());
            Some(err)
        }
    }
}
