use std::time::Duration;

use serde_json::json;

use profile_guard::{CacheView, ErrorKind, RecordStore, UpdateOperation};

use crate::support::{coordinator, profile, seeded, BarrierStore};

// ============================================================================
// Single writer
// ============================================================================

#[tokio::test]
async fn increment_nested_field_bumps_version_and_invalidates_views() {
    let store = seeded(&[profile("u1", 7, 3)]);
    let coordinator = coordinator(store.clone());
    let caches = coordinator.caches();
    caches.put(CacheView::ProfileView, "u1", json!({"tone": 3})).unwrap();
    caches.put(CacheView::ScoreView, "u1", json!(10)).unwrap();

    let result = coordinator
        .increment_field("u1", "subProfile.tone", 2, true)
        .await;

    assert!(result.is_success());
    assert_eq!(result.retry_count(), 0);
    let record = result.record().unwrap();
    assert_eq!(record.version, 8);
    assert_eq!(record.get("subProfile.tone"), Some(json!(5)));

    assert_eq!(
        caches.invalidations(),
        vec![
            (CacheView::ProfileView, "u1".to_string()),
            (CacheView::ScoreView, "u1".to_string()),
        ]
    );
    assert!(caches.get(CacheView::ProfileView, "u1").is_none());
    assert!(caches.get(CacheView::ScoreView, "u1").is_none());

    assert_eq!(store.read("u1").await.unwrap().as_ref(), Some(record));
    assert!(!coordinator.lock().store().is_held("lock:profile:u1"));
}

#[tokio::test]
async fn many_operations_commit_as_one_version() {
    let store = seeded(&[profile("u1", 7, 3)]);
    let coordinator = coordinator(store.clone());

    let record = coordinator
        .update(
            "u1",
            vec![
                UpdateOperation::replace("name", "ada"),
                UpdateOperation::increment("subProfile.tone", 1),
                UpdateOperation::replace("subProfile.voice", "dry"),
                UpdateOperation::append_to_list("tags", "a"),
                UpdateOperation::append_to_list("tags", "b"),
            ],
            true,
        )
        .await
        .into_result()
        .unwrap();

    assert_eq!(record.version, 8);
    assert_eq!(record.get("name"), Some(json!("ada")));
    assert_eq!(record.get("subProfile.tone"), Some(json!(4)));
    assert_eq!(record.get("subProfile.voice"), Some(json!("dry")));
    // Same kind and field within one request: the later operation wins.
    assert_eq!(record.get("tags"), Some(json!(["b"])));
}

#[tokio::test]
async fn last_modified_is_touched_on_commit() {
    let before = profile("u1", 7, 3);
    let stale = before.last_modified;
    let coordinator = coordinator(seeded(&[before]));

    tokio::time::sleep(Duration::from_millis(5)).await;
    let record = coordinator
        .update_field("u1", "name", "ada", true)
        .await
        .into_result()
        .unwrap();

    assert!(record.last_modified > stale);
}

// ============================================================================
// Convenience wrappers
// ============================================================================

#[tokio::test]
async fn update_field_matches_single_replace_operation() {
    let left = seeded(&[profile("u1", 7, 3)]);
    let right = seeded(&[profile("u1", 7, 3)]);

    let via_wrapper = coordinator(left)
        .update_field("u1", "x", 5, true)
        .await
        .into_result()
        .unwrap();
    let via_update = coordinator(right)
        .update("u1", vec![UpdateOperation::replace("x", 5)], true)
        .await
        .into_result()
        .unwrap();

    assert_eq!(via_wrapper.version, 8);
    assert_eq!(via_wrapper.version, via_update.version);
    assert_eq!(via_wrapper.id, via_update.id);
    assert_eq!(via_wrapper.sub_profile, via_update.sub_profile);
    assert_eq!(via_wrapper.fields, via_update.fields);
}

#[tokio::test]
async fn increment_field_matches_single_increment_operation() {
    let left = seeded(&[profile("u1", 7, 3)]);
    let right = seeded(&[profile("u1", 7, 3)]);

    let via_wrapper = coordinator(left)
        .increment_field("u1", "subProfile.tone", 1, true)
        .await
        .into_result()
        .unwrap();
    let via_update = coordinator(right)
        .update(
            "u1",
            vec![UpdateOperation::increment("subProfile.tone", 1)],
            true,
        )
        .await
        .into_result()
        .unwrap();

    assert_eq!(via_wrapper.version, via_update.version);
    assert_eq!(via_wrapper.sub_profile, via_update.sub_profile);
    assert_eq!(via_wrapper.get("subProfile.tone"), Some(json!(4)));
}

#[tokio::test]
async fn list_wrappers_append_and_remove() {
    let store = seeded(&[profile("u1", 1, 0)]);
    let coordinator = coordinator(store.clone());

    coordinator.append_to_list("u1", "tags", "rust", true).await;
    coordinator.append_to_list("u1", "tags", "go", true).await;
    coordinator.append_to_list("u1", "tags", "rust", true).await;
    let record = coordinator
        .remove_from_list("u1", "tags", "rust", true)
        .await
        .into_result()
        .unwrap();

    assert_eq!(record.get("tags"), Some(json!(["go"])));
    assert_eq!(record.version, 5);
}

// ============================================================================
// Two writers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn simultaneous_writers_serialize_through_one_retry() {
    let store = seeded(&[profile("u1", 7, 3)]);
    let racing = BarrierStore::new(store.clone(), 2);
    let coordinator = coordinator(racing.clone());

    // Both callers read version 7 before either writes.
    let (a, b) = tokio::join!(
        coordinator.update_field("u1", "subProfile.tone", 10, false),
        coordinator.update_field("u1", "subProfile.tone", 20, false),
    );

    assert!(a.is_success());
    assert!(b.is_success());
    let mut retries = [a.retry_count(), b.retry_count()];
    retries.sort_unstable();
    assert_eq!(retries, [0, 1]);
    assert_eq!(racing.reads(), 3);

    let (winner, loser) = if a.retry_count() == 0 { (a, b) } else { (b, a) };
    assert_eq!(winner.record().unwrap().version, 8);
    assert_eq!(loser.record().unwrap().version, 9);

    let stored = store.read("u1").await.unwrap().unwrap();
    assert_eq!(stored.version, 9);
    assert_eq!(
        stored.get("subProfile.tone"),
        loser.record().unwrap().get("subProfile.tone")
    );
}

#[tokio::test(start_paused = true)]
async fn crashed_lock_holder_is_bypassed_after_ttl() {
    let coordinator = coordinator(seeded(&[profile("u1", 7, 3)]));

    // A writer that took the lock and never came back.
    assert!(coordinator.lock().acquire("u1").await.unwrap());

    let blocked = coordinator.update_field("u1", "x", 1, true).await;
    assert_eq!(blocked.error_kind(), Some(ErrorKind::LockHeld));

    tokio::time::advance(coordinator.config().lock_ttl()).await;

    let result = coordinator.update_field("u1", "x", 1, true).await;
    assert!(result.is_success());
    assert_eq!(result.record().unwrap().version, 8);
}
