use async_trait::async_trait;
use folio_document::{DocumentKind, FileId};
use folio_refs::collect_virtual_refs;
use folio_session::{EditSession, PublishError};
use folio_store::{
    CreateItem, CreatedDocument, DocumentStore, MemoryStore, SaveItem, SavedDocument,
    StoreResult, StoredDocument,
};
use folio_test_utils::{
    dashboard_content, layout_item, question_content, report_content, seeded_store, SlowStore,
};
use mockall::mock;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn dashboard_session() -> (Arc<MemoryStore>, EditSession, Vec<FileId>, FileId) {
    let (store, question_ids) = seeded_store(2);
    let dash = store.seed(
        DocumentKind::Dashboard,
        "dashboards",
        dashboard_content("Overview", &question_ids),
    );
    let session = EditSession::new(store.clone());
    let mut ids = question_ids.clone();
    ids.push(dash);
    session.load_many(ids).await.unwrap();
    (store, session, question_ids, dash)
}

// Reads the current asset/layout arrays, appends the draft, writes both
// back. Arrays replace wholesale on edit, so the whole list goes out.
fn wire_into_dashboard(session: &EditSession, dash: FileId, draft: FileId) {
    let merged = session.merged_content(dash).unwrap();
    let mut assets = merged["assets"].as_array().cloned().unwrap_or_default();
    let mut items = merged
        .pointer("/layout/items")
        .and_then(|items| items.as_array())
        .cloned()
        .unwrap_or_default();
    assets.push(json!({ "type": "question", "id": draft }));
    items.push(layout_item(draft, 4 * items.len() as i64, 0));
    session
        .edit(
            dash,
            json!({ "assets": assets, "layout": { "columns": 24, "items": items } }),
        )
        .unwrap();
}

#[tokio::test]
async fn test_noop_publish_makes_no_store_calls() {
    let (store, session, _, _) = dashboard_session().await;
    let receipt = session.publish_all().await.unwrap();
    assert!(receipt.is_noop());
    // the setup load is the only call
    assert_eq!(store.total_calls(), 1);
}

#[tokio::test]
async fn test_publish_rewrites_virtual_ids_atomically() {
    let (store, session, question_ids, dash) = dashboard_session().await;
    for &q in &question_ids {
        session.edit(q, json!({ "description": "updated" })).unwrap();
    }
    let draft = session.create_virtual(
        DocumentKind::Question,
        None,
        question_content("Draft Question"),
    );
    wire_into_dashboard(&session, dash, draft);

    let receipt = session.publish_all().await.unwrap();

    let real = receipt.created[&draft];
    assert!(real.is_real());
    assert_eq!(receipt.saved.len(), 3);

    let stored = store.document(real).unwrap();
    assert_eq!(stored.kind, DocumentKind::Question);
    assert_eq!(stored.content["name"], json!("Draft Question"));

    let persisted = store.document(dash).unwrap();
    let assets = persisted.content["assets"].as_array().unwrap();
    assert!(assets.iter().any(|asset| asset["id"] == real.to_value()));
    let items = persisted.content.pointer("/layout/items").unwrap().as_array().unwrap();
    assert!(items.iter().any(|item| item["id"] == real.to_value()));
    assert!(collect_virtual_refs(&persisted.content, DocumentKind::Dashboard).is_empty());

    assert!(session.list_dirty().is_empty());
    assert!(!session.is_tracked(draft));
    assert!(session.is_tracked(real));
    assert!(!session.is_dirty(real));
}

#[tokio::test]
async fn test_report_wrapped_references_are_rewritten() {
    let (store, question_ids) = seeded_store(1);
    let report = store.seed(
        DocumentKind::Report,
        "reports",
        report_content("Weekly Summary", &question_ids),
    );
    let session = EditSession::new(store.clone());
    session
        .load_many(vec![question_ids[0], report])
        .await
        .unwrap();

    let draft = session.create_virtual(DocumentKind::Question, None, question_content("Draft"));
    let merged = session.merged_content(report).unwrap();
    let mut references = merged["references"].as_array().cloned().unwrap_or_default();
    references.push(json!({ "reference": { "id": draft, "type": "question" } }));
    session
        .edit(report, json!({ "references": references }))
        .unwrap();

    let receipt = session.publish_all().await.unwrap();
    let real = receipt.created[&draft];

    let persisted = store.document(report).unwrap();
    let entries = persisted.content["references"].as_array().unwrap();
    assert!(entries
        .iter()
        .any(|entry| entry["reference"]["id"] == real.to_value()));
    assert!(collect_virtual_refs(&persisted.content, DocumentKind::Report).is_empty());
}

#[tokio::test]
async fn test_publish_issues_at_most_two_calls_for_many_documents() {
    let (store, question_ids) = seeded_store(5);
    let dash = store.seed(
        DocumentKind::Dashboard,
        "dashboards",
        dashboard_content("Wide", &question_ids),
    );
    let session = EditSession::new(store.clone());
    let mut ids = question_ids.clone();
    ids.push(dash);
    session.load_many(ids).await.unwrap();

    for &q in &question_ids {
        session.edit(q, json!({ "description": "touched" })).unwrap();
    }
    for n in 0..2 {
        let draft = session.create_virtual(
            DocumentKind::Question,
            None,
            question_content(&format!("Draft {n}")),
        );
        wire_into_dashboard(&session, dash, draft);
    }

    let receipt = session.publish_all().await.unwrap();
    assert_eq!(receipt.created.len(), 2);
    assert_eq!(receipt.saved.len(), 6);
    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.save_calls(), 1);
    assert_eq!(store.total_calls(), 3);
}

#[tokio::test]
async fn test_create_only_publish_skips_the_save_call() {
    let (store, _) = seeded_store(0);
    let session = EditSession::new(store.clone());
    let keep = session.create_virtual(DocumentKind::Question, None, question_content("Keep"));
    let discarded = session.create_virtual(DocumentKind::Question, None, question_content("Drop"));
    session.clear_changes(discarded).unwrap();

    let receipt = session.publish_all().await.unwrap();
    assert_eq!(receipt.created.len(), 1);
    assert!(receipt.created.contains_key(&keep));
    assert!(receipt.saved.is_empty());
    assert_eq!(store.len(), 1);
    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.save_calls(), 0);
}

#[tokio::test]
async fn test_create_failure_aborts_with_nothing_persisted() {
    let (store, session, question_ids, dash) = dashboard_session().await;
    session
        .edit(question_ids[0], json!({ "description": "updated" }))
        .unwrap();
    let draft = session.create_virtual(
        DocumentKind::Question,
        None,
        question_content("Draft Question"),
    );
    wire_into_dashboard(&session, dash, draft);
    let dirty_before = session.list_dirty().len();

    store.fail_next_create();
    let err = session.publish_all().await.unwrap_err();
    let PublishError::CreateFailed(source) = &err else {
        panic!("expected create failure, got {err}");
    };
    assert!(source.is_retryable());
    assert_eq!(store.save_calls(), 0);
    assert_eq!(store.len(), 3);
    assert_eq!(session.list_dirty().len(), dirty_before);
    assert!(session.is_tracked(draft));

    let receipt = session.publish_all().await.unwrap();
    assert_eq!(receipt.created.len(), 1);
    assert_eq!(store.create_calls(), 2);
    assert_eq!(store.save_calls(), 1);
}

#[tokio::test]
async fn test_save_failure_keeps_created_documents_and_retry_converges() {
    let (store, session, question_ids, dash) = dashboard_session().await;
    for &q in &question_ids {
        session.edit(q, json!({ "description": "updated" })).unwrap();
    }
    let draft = session.create_virtual(
        DocumentKind::Question,
        None,
        question_content("Draft Question"),
    );
    wire_into_dashboard(&session, dash, draft);

    store.fail_next_save();
    let err = session.publish_all().await.unwrap_err();
    assert!(matches!(err, PublishError::SaveFailed { created: 1, .. }));

    // created document survives the failed save, re-keyed to its real id
    let real = FileId::from_raw(4);
    assert!(store.document(real).is_some());
    assert!(!session.is_tracked(draft));
    assert!(session.is_tracked(real));
    assert!(!session.is_dirty(real));

    // the dashboard's pending changes already hold the real id
    let merged = session.merged_content(dash).unwrap();
    assert!(collect_virtual_refs(&merged, DocumentKind::Dashboard).is_empty());
    assert_eq!(session.list_dirty().len(), 3);

    let receipt = session.publish_all().await.unwrap();
    assert!(receipt.created.is_empty());
    assert_eq!(receipt.saved.len(), 3);
    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.save_calls(), 2);
    assert!(session.list_dirty().is_empty());
    assert!(collect_virtual_refs(&store.document(dash).unwrap().content, DocumentKind::Dashboard).is_empty());
}

#[tokio::test]
async fn test_dangling_virtual_reference_blocks_publish() {
    let (store, session, _, dash) = dashboard_session().await;
    session
        .edit(dash, json!({ "assets": [{ "type": "question", "id": -5 }] }))
        .unwrap();

    let err = session.publish_all().await.unwrap_err();
    assert_eq!(err, PublishError::dangling(dash, FileId::from_raw(-5)));
    assert_eq!(store.create_calls(), 0);
    assert_eq!(store.save_calls(), 0);
    assert!(session.is_dirty(dash));
}

#[tokio::test]
async fn test_edit_during_save_stays_pending() {
    let (store, question_ids) = seeded_store(1);
    let q = question_ids[0];
    let session = Arc::new(EditSession::new(store.clone()));
    session.load(q).await.unwrap();
    session
        .edit(q, json!({ "description": "before", "tagline": "keep" }))
        .unwrap();

    let hook_session = session.clone();
    store.on_next_save(move || {
        hook_session
            .edit(q, json!({ "description": "mid-save" }))
            .unwrap();
    });

    let receipt = session.publish_all().await.unwrap();
    assert_eq!(receipt.saved, vec![q]);

    // the key edited while the save was in flight survives, the rest clears
    let record = session.record(q).unwrap();
    assert_eq!(record.pending_changes.get("description"), Some(&json!("mid-save")));
    assert!(record.pending_changes.get("tagline").is_none());
    assert!(session.is_dirty(q));
    assert_eq!(store.document(q).unwrap().content["description"], json!("before"));
}

#[tokio::test]
async fn test_publish_file_saves_one_document() {
    let (store, question_ids) = seeded_store(2);
    let q = question_ids[0];
    let session = EditSession::new(store.clone());
    session.load_many(question_ids.clone()).await.unwrap();
    session.edit(q, json!({ "description": "solo save" })).unwrap();

    let receipt = session.publish_file(q).await.unwrap();
    assert_eq!(receipt.saved, vec![q]);
    assert!(receipt.created.is_empty());
    assert_eq!(store.save_calls(), 1);
    assert_eq!(store.document(q).unwrap().content["description"], json!("solo save"));
    assert!(!session.is_dirty(q));

    // clean document: nothing to do, nothing sent
    let receipt = session.publish_file(q).await.unwrap();
    assert!(receipt.is_noop());
    assert_eq!(store.save_calls(), 1);
}

#[tokio::test]
async fn test_publish_file_rejects_virtual_documents() {
    let (store, _) = seeded_store(0);
    let session = EditSession::new(store.clone());
    let draft = session.create_virtual(DocumentKind::Question, None, question_content("Draft"));

    let err = session.publish_file(draft).await.unwrap_err();
    assert_eq!(err, PublishError::VirtualPublish(draft));

    let err = session.publish_file(FileId::from_raw(999)).await.unwrap_err();
    assert_eq!(err, PublishError::UnknownDocument(FileId::from_raw(999)));
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_publish_is_rejected() {
    let (mem, question_ids) = seeded_store(1);
    let q = question_ids[0];
    let store = Arc::new(SlowStore::new(mem.clone(), Duration::from_millis(50)));
    let session = EditSession::new(store);
    session.load(q).await.unwrap();
    session.edit(q, json!({ "description": "raced" })).unwrap();

    let (first, second) = tokio::join!(session.publish_all(), session.publish_all());
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, Err(PublishError::AlreadyPublishing))));
    assert_eq!(mem.save_calls(), 1);
}

mock! {
    Store {}

    #[async_trait]
    impl DocumentStore for Store {
        async fn batch_create(&self, items: Vec<CreateItem>) -> StoreResult<Vec<CreatedDocument>>;
        async fn batch_save(&self, items: Vec<SaveItem>) -> StoreResult<Vec<SavedDocument>>;
        async fn load_many(&self, ids: Vec<FileId>) -> StoreResult<Vec<StoredDocument>>;
    }
}

#[tokio::test]
async fn test_publish_call_counts_verified_by_mock() {
    let mut mock = MockStore::new();
    mock.expect_load_many().times(1).returning(|ids| {
        Ok(ids
            .into_iter()
            .map(|id| StoredDocument {
                id,
                kind: DocumentKind::Question,
                path: "questions".to_string(),
                content: json!({ "name": format!("Question {id}") }),
            })
            .collect())
    });
    mock.expect_batch_create()
        .times(1)
        .withf(|items| items.len() == 1)
        .returning(|items| {
            Ok(items
                .into_iter()
                .enumerate()
                .map(|(n, item)| CreatedDocument {
                    virtual_id: item.virtual_id,
                    real_id: FileId::from_raw(100 + n as i64),
                    persisted_content: item.content,
                })
                .collect())
        });
    mock.expect_batch_save()
        .times(1)
        .withf(|items| items.len() == 2)
        .returning(|items| {
            Ok(items
                .into_iter()
                .map(|item| SavedDocument {
                    id: item.id,
                    persisted_content: json!({ "name": "saved" }),
                })
                .collect())
        });

    let session = EditSession::new(Arc::new(mock));
    let a = FileId::from_raw(1);
    let b = FileId::from_raw(2);
    session.load_many(vec![a, b]).await.unwrap();
    session.edit(a, json!({ "description": "first" })).unwrap();
    session.edit(b, json!({ "description": "second" })).unwrap();
    session.create_virtual(DocumentKind::Question, None, question_content("Draft"));

    let receipt = session.publish_all().await.unwrap();
    assert_eq!(receipt.created.len(), 1);
    assert_eq!(receipt.saved.len(), 2);
}
