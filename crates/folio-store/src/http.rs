//! HTTP store backend
//!
//! Talks to a document server over three routes: POST
//! `api/files/batch-create`, POST `api/files/batch-save`, and GET
//! `api/files?ids=..`. Request and response bodies wrap their payload in
//! an `items` array.

use crate::{
    CreateItem, CreatedDocument, DocumentStore, SaveItem, SavedDocument, StoreError, StoreResult,
    StoredDocument,
};
use async_trait::async_trait;
use folio_document::FileId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reqwest-backed document store.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct BatchRequest<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct BatchResponse<T> {
    items: Vec<T>,
}

impl HttpStore {
    /// Create a store with a default client.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a store with a caller-configured client.
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Server base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_batch<T, R>(&self, path: &str, items: Vec<T>) -> StoreResult<Vec<R>>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!(url = %url, count = items.len(), "posting batch");
        let response = self
            .client
            .post(&url)
            .json(&BatchRequest { items })
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> StoreResult<Vec<R>> {
    let status = response.status();
    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Transport(format!("{status}: {body}")));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Rejected(format!("{status}: {body}")));
    }
    let batch: BatchResponse<R> = response
        .json()
        .await
        .map_err(|err| StoreError::MalformedResponse(err.to_string()))?;
    Ok(batch.items)
}

fn ids_param(ids: &[FileId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn batch_create(&self, items: Vec<CreateItem>) -> StoreResult<Vec<CreatedDocument>> {
        self.post_batch("api/files/batch-create", items).await
    }

    async fn batch_save(&self, items: Vec<SaveItem>) -> StoreResult<Vec<SavedDocument>> {
        self.post_batch("api/files/batch-save", items).await
    }

    async fn load_many(&self, ids: Vec<FileId>) -> StoreResult<Vec<StoredDocument>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint("api/files");
        tracing::debug!(url = %url, count = ids.len(), "loading documents");
        let response = self
            .client
            .get(&url)
            .query(&[("ids", ids_param(&ids))])
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        let documents: Vec<StoredDocument> = decode(response).await?;

        let returned: HashSet<FileId> = documents.iter().map(|doc| doc.id).collect();
        let missing: Vec<FileId> = ids
            .into_iter()
            .filter(|id| !returned.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::NotFound(missing));
        }
        Ok(documents)
    }
}
