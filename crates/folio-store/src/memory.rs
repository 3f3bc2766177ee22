//! In-memory store backend
//!
//! The test/demo double: real id assignment, server-side patch
//! application, call counters for the bounded-calls contract, one-shot
//! failure injection, and an optional save hook so tests can interleave
//! work while a save is "in flight".

use crate::{
    CreateItem, CreatedDocument, DocumentStore, SaveItem, SavedDocument, StoreError, StoreResult,
    StoredDocument,
};
use async_trait::async_trait;
use dashmap::DashMap;
use folio_document::{merge_patch, FileId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

type SaveHook = Box<dyn FnOnce() + Send>;

/// DashMap-backed document store.
pub struct MemoryStore {
    documents: DashMap<FileId, StoredDocument>,
    next_id: AtomicI64,
    create_calls: AtomicUsize,
    save_calls: AtomicUsize,
    load_calls: AtomicUsize,
    fail_next_create: AtomicBool,
    fail_next_save: AtomicBool,
    on_save: Mutex<Option<SaveHook>>,
}

impl MemoryStore {
    /// Create an empty store; real ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            next_id: AtomicI64::new(1),
            create_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
            fail_next_create: AtomicBool::new(false),
            fail_next_save: AtomicBool::new(false),
            on_save: Mutex::new(None),
        }
    }

    /// Insert a document directly, assigning the next real id.
    pub fn seed(
        &self,
        kind: folio_document::DocumentKind,
        path: impl Into<String>,
        content: serde_json::Value,
    ) -> FileId {
        let id = FileId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.documents.insert(
            id,
            StoredDocument {
                id,
                kind,
                path: path.into(),
                content,
            },
        );
        id
    }

    /// Current persisted form of a document.
    #[must_use]
    pub fn document(&self, id: FileId) -> Option<StoredDocument> {
        self.documents.get(&id).map(|entry| entry.clone())
    }

    /// Number of documents held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Batch-create calls issued so far (failed calls count too).
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Batch-save calls issued so far (failed calls count too).
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Load calls issued so far.
    #[must_use]
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Total network-shaped calls issued so far.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.create_calls() + self.save_calls() + self.load_calls()
    }

    /// Make the next batch-create fail with a transport error.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Make the next batch-save fail with a transport error.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Run `hook` at the start of the next batch-save, before anything is
    /// applied (the window where a save is in flight).
    pub fn on_next_save(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_save.lock() = Some(Box::new(hook));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn batch_create(&self, items: Vec<CreateItem>) -> StoreResult<Vec<CreatedDocument>> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transport("injected create failure".to_string()));
        }

        for item in &items {
            if !item.virtual_id.is_virtual() {
                return Err(StoreError::Rejected(format!(
                    "batch-create expects virtual ids, got {}",
                    item.virtual_id
                )));
            }
        }

        let mut created = Vec::with_capacity(items.len());
        for item in items {
            let real_id = FileId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst));
            tracing::debug!(virtual_id = %item.virtual_id, real_id = %real_id, "memory store created document");
            self.documents.insert(
                real_id,
                StoredDocument {
                    id: real_id,
                    kind: item.kind,
                    path: item.path,
                    content: item.content.clone(),
                },
            );
            created.push(CreatedDocument {
                virtual_id: item.virtual_id,
                real_id,
                persisted_content: item.content,
            });
        }
        Ok(created)
    }

    async fn batch_save(&self, items: Vec<SaveItem>) -> StoreResult<Vec<SavedDocument>> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_save.lock().take() {
            hook();
        }
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transport("injected save failure".to_string()));
        }

        let missing: Vec<FileId> = items
            .iter()
            .map(|item| item.id)
            .filter(|id| !self.documents.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::NotFound(missing));
        }

        let mut saved = Vec::with_capacity(items.len());
        for item in items {
            let persisted = {
                // contains_key checked above; entry cannot be missing
                let mut entry = match self.documents.get_mut(&item.id) {
                    Some(entry) => entry,
                    None => return Err(StoreError::NotFound(vec![item.id])),
                };
                entry.content = merge_patch(&entry.content, &item.changes);
                entry.content.clone()
            };
            tracing::debug!(id = %item.id, "memory store saved document");
            saved.push(SavedDocument {
                id: item.id,
                persisted_content: persisted,
            });
        }
        Ok(saved)
    }

    async fn load_many(&self, ids: Vec<FileId>) -> StoreResult<Vec<StoredDocument>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let missing: Vec<FileId> = ids
            .iter()
            .copied()
            .filter(|id| !self.documents.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::NotFound(missing));
        }
        Ok(ids
            .into_iter()
            .filter_map(|id| self.documents.get(&id).map(|entry| entry.clone()))
            .collect())
    }
}
