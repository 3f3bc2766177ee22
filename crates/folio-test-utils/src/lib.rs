//! Testing utilities for the Folio workspace
//!
//! Shared content fixtures and store doubles.

#![allow(missing_docs)]

use async_trait::async_trait;
use folio_document::{DocumentKind, FileId};
use folio_store::{
    CreateItem, CreatedDocument, DocumentStore, MemoryStore, SaveItem, SavedDocument,
    StoreResult, StoredDocument,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub fn question_content(name: &str) -> Value {
    json!({
        "name": name,
        "description": "fixture",
        "query": "select count(*) from orders",
        "vizSettings": { "type": "bar" }
    })
}

pub fn pivot_question_content(name: &str) -> Value {
    json!({
        "name": name,
        "query": "select category, region, sum(amount) from orders group by 1, 2",
        "vizSettings": {
            "type": "pivot",
            "pivotConfig": { "rows": ["category"], "columns": ["region"], "values": ["sum"] }
        }
    })
}

pub fn dashboard_content(name: &str, asset_ids: &[FileId]) -> Value {
    let assets: Vec<Value> = asset_ids
        .iter()
        .map(|id| json!({ "type": "question", "id": id }))
        .collect();
    let items: Vec<Value> = asset_ids
        .iter()
        .enumerate()
        .map(|(n, id)| json!({ "id": id, "x": 4 * (n as i64), "y": 0, "w": 4, "h": 4 }))
        .collect();
    json!({
        "name": name,
        "assets": assets,
        "layout": { "columns": 24, "items": items }
    })
}

pub fn layout_item(id: FileId, x: i64, y: i64) -> Value {
    json!({ "id": id, "x": x, "y": y, "w": 4, "h": 4 })
}

pub fn report_content(name: &str, reference_ids: &[FileId]) -> Value {
    let references: Vec<Value> = reference_ids
        .iter()
        .map(|id| json!({ "reference": { "id": id, "type": "question" } }))
        .collect();
    json!({ "name": name, "references": references })
}

pub fn seeded_store(questions: usize) -> (Arc<MemoryStore>, Vec<FileId>) {
    let store = Arc::new(MemoryStore::new());
    let ids = (0..questions)
        .map(|n| {
            store.seed(
                DocumentKind::Question,
                "questions",
                question_content(&format!("Question {}", n + 1)),
            )
        })
        .collect();
    (store, ids)
}

/// Store double that sleeps before every call, for exercising what the
/// session does while a request is still in flight.
pub struct SlowStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl DocumentStore for SlowStore {
    async fn batch_create(&self, items: Vec<CreateItem>) -> StoreResult<Vec<CreatedDocument>> {
        tokio::time::sleep(self.delay).await;
        self.inner.batch_create(items).await
    }

    async fn batch_save(&self, items: Vec<SaveItem>) -> StoreResult<Vec<SavedDocument>> {
        tokio::time::sleep(self.delay).await;
        self.inner.batch_save(items).await
    }

    async fn load_many(&self, ids: Vec<FileId>) -> StoreResult<Vec<StoredDocument>> {
        tokio::time::sleep(self.delay).await;
        self.inner.load_many(ids).await
    }
}
