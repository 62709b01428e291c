use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

use tagstore::storage::{FailPoint, MemoryDatastore};
use tagstore::{EngineConfig, Error, TagStore};

fn payload(rule: &str) -> EngineConfig {
    EngineConfig::new(json!({
        "fields": {"amount": "number"},
        "rules": {rule: {"when": "amount > 100"}}
    }))
}

fn setup() -> (MemoryDatastore, TagStore) {
    let memory = MemoryDatastore::new();
    let store = TagStore::new(Arc::new(memory.clone()));
    (memory, store)
}

/// Every referenced record exists and no record is unreferenced.
fn assert_consistent(memory: &MemoryDatastore) {
    let mut referenced = 0;
    for engine in memory.engines() {
        assert!(!engine.tags.is_empty(), "engine {} has no tags", engine.name);
        if !engine.default_tag.is_empty() {
            let default = engine.tag(&engine.default_tag).expect("default tag exists");
            assert!(default.is_enabled);
        }
        for tag in engine.tags.values() {
            assert!(memory.config(tag.config_ref).is_some());
            referenced += 1;
        }
    }
    assert_eq!(memory.config_count(), referenced);
}

#[tokio::test]
async fn test_publish_and_roll_forward() {
    let (memory, store) = setup();

    store
        .create_tagged_config("billing", "v1", &payload("first"))
        .await
        .unwrap();
    store.enable_tag("billing", "v1").await.unwrap();
    store.set_default_tag("billing", "v1").await.unwrap();

    store
        .create_tagged_config("billing", "v2", &payload("second"))
        .await
        .unwrap();
    store.enable_tag("billing", "v2").await.unwrap();
    store.set_default_tag("billing", "v2").await.unwrap();

    store.disable_tag("billing", "v1").await.unwrap();
    store.delete_tagged_config("billing", "v1").await.unwrap();

    let view = store.get_complete_rule_engine("billing").await.unwrap();
    assert_eq!(view.default_tag, "v2");
    assert_eq!(view.tags.len(), 1);
    assert!(view.tags["v2"].is_enabled);
    assert_eq!(view.tags["v2"].config, payload("second"));
    assert_consistent(&memory);
}

#[tokio::test]
async fn test_default_tag_is_protected() {
    let (memory, store) = setup();

    store
        .create_tagged_config("fraud", "live", &payload("score"))
        .await
        .unwrap();
    store.enable_tag("fraud", "live").await.unwrap();
    store.set_default_tag("fraud", "live").await.unwrap();

    let err = store.disable_tag("fraud", "live").await.unwrap_err();
    assert!(matches!(err, Error::TagDisableNotAllowed { .. }));

    let err = store.delete_tagged_config("fraud", "live").await.unwrap_err();
    assert!(matches!(err, Error::TagDeleteNotAllowed { .. }));

    let engine = memory.engine("fraud").unwrap();
    assert_eq!(engine.default_tag, "live");
    assert!(engine.tag("live").unwrap().is_enabled);
    assert_consistent(&memory);
}

#[tokio::test]
async fn test_enabled_tag_cannot_be_deleted() {
    let (memory, store) = setup();

    store
        .create_tagged_config("fraud", "canary", &payload("score"))
        .await
        .unwrap();
    store.enable_tag("fraud", "canary").await.unwrap();

    let err = store
        .delete_tagged_config("fraud", "canary")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TagDeleteNotAllowed { .. }));
    assert_eq!(memory.config_count(), 1);
}

#[tokio::test]
async fn test_duplicate_tag_is_rejected_without_new_record() {
    let (memory, store) = setup();

    store
        .create_tagged_config("billing", "v1", &payload("first"))
        .await
        .unwrap();
    let err = store
        .create_tagged_config("billing", "v1", &payload("other"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TagAlreadyExists { .. }));
    assert_eq!(memory.config_count(), 1);

    let view = store.get_complete_rule_engine("billing").await.unwrap();
    assert_eq!(view.tags["v1"].config, payload("first"));
}

#[tokio::test]
async fn test_delete_engine_cascades_to_records() {
    let (memory, store) = setup();

    for tag in ["v1", "v2", "v3"] {
        store
            .create_tagged_config("billing", tag, &payload(tag))
            .await
            .unwrap();
    }
    store
        .create_tagged_config("fraud", "v1", &payload("keep"))
        .await
        .unwrap();
    store.enable_tag("billing", "v2").await.unwrap();
    store.set_default_tag("billing", "v2").await.unwrap();
    assert_eq!(memory.config_count(), 4);

    store.delete_rule_engine("billing").await.unwrap();

    assert!(memory.engine("billing").is_none());
    assert_eq!(memory.config_count(), 1);
    assert!(matches!(
        store.get_complete_rule_engine("billing").await,
        Err(Error::NotFound(_))
    ));
    assert_consistent(&memory);
}

#[tokio::test]
async fn test_failed_engine_write_leaves_no_orphan_record() {
    let (memory, store) = setup();

    store
        .create_tagged_config("billing", "v1", &payload("first"))
        .await
        .unwrap();

    memory.fail_at(FailPoint::UpsertEngine);
    let err = store
        .create_tagged_config("billing", "v2", &payload("second"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DatastoreFailed(_)));
    assert_eq!(memory.config_count(), 1);
    assert!(memory.engine("billing").unwrap().tag("v2").is_none());
    assert_consistent(&memory);
}

#[tokio::test]
async fn test_failed_engine_delete_keeps_records() {
    let (memory, store) = setup();

    store
        .create_tagged_config("billing", "v1", &payload("first"))
        .await
        .unwrap();
    store
        .create_tagged_config("billing", "v2", &payload("second"))
        .await
        .unwrap();

    memory.fail_at(FailPoint::DeleteEngine);
    let err = store.delete_rule_engine("billing").await.unwrap_err();

    assert!(matches!(err, Error::DatastoreFailed(_)));
    assert_eq!(memory.engine("billing").unwrap().tags.len(), 2);
    assert_eq!(memory.config_count(), 2);
    assert_consistent(&memory);

    // The failure is one-shot; the retry goes through.
    store.delete_rule_engine("billing").await.unwrap();
    assert_eq!(memory.config_count(), 0);
}

#[tokio::test]
async fn test_failed_last_tag_delete_keeps_engine() {
    let (memory, store) = setup();

    store
        .create_tagged_config("billing", "v1", &payload("first"))
        .await
        .unwrap();

    memory.fail_at(FailPoint::DeleteEngine);
    let err = store.delete_tagged_config("billing", "v1").await.unwrap_err();

    assert!(matches!(err, Error::DatastoreFailed(_)));
    assert!(memory.engine("billing").is_some());
    assert_eq!(memory.config_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_lose_no_tags() {
    let (memory, store) = setup();

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let tag = format!("t{i}");
            let result = store
                .create_tagged_config("shared", &tag, &payload(&tag))
                .await;
            (tag, result)
        }));
    }

    let mut created = BTreeSet::new();
    for handle in handles {
        let (tag, result) = handle.await.unwrap();
        match result {
            Ok(()) => {
                created.insert(tag);
            }
            // A conflicting commit loses the race and is rolled back.
            Err(Error::DatastoreFailed(_)) => {}
            Err(other) => panic!("unexpected error for {tag}: {other}"),
        }
    }

    assert!(!created.is_empty());
    let engine = memory.engine("shared").unwrap();
    let stored: BTreeSet<String> = engine.tags.keys().cloned().collect();
    assert_eq!(stored, created);
    assert_consistent(&memory);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggles_keep_default_enabled() {
    let (memory, store) = setup();

    store
        .create_tagged_config("billing", "v1", &payload("first"))
        .await
        .unwrap();
    store.enable_tag("billing", "v1").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..12 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            match i % 3 {
                0 => store.set_default_tag("billing", "v1").await,
                1 => store.disable_tag("billing", "v1").await,
                _ => store.enable_tag("billing", "v1").await,
            }
        }));
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    assert_consistent(&memory);
}
