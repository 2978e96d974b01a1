use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use profile_guard::{CoordinatorConfig, ErrorKind, Record, RecordStore};

use crate::support::{
    assert_lock_free, coordinator, coordinator_with, profile, seeded, CountingStore, FaultyStore,
    RacingStore,
};

fn fast_backoff() -> CoordinatorConfig {
    CoordinatorConfig::new().with_base_backoff(Duration::from_millis(1))
}

// ============================================================================
// No lost updates
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_disjoint_updates_lose_nothing() {
    const WRITERS: usize = 16;

    for use_lock in [false, true] {
        let store = seeded(&[profile("u1", 0, 0)]);
        let coordinator = Arc::new(coordinator_with(store.clone(), fast_backoff()));

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    let field = format!("f{}", i);
                    let result = coordinator.update_field("u1", &field, i, use_lock).await;
                    (field, result)
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(WRITERS);
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        let stored = store.read("u1").await.unwrap().unwrap();
        let mut successes = 0;
        for (field, result) in &outcomes {
            if result.is_success() {
                successes += 1;
                assert!(stored.get(field).is_some(), "lost update to {}", field);
            } else {
                let kind = result.error_kind().unwrap();
                assert!(kind.is_retryable_by_caller(), "unexpected {:?}", kind);
                assert!(stored.get(field).is_none(), "failed update to {} landed", field);
            }
        }
        assert!(successes >= 1);
        assert_eq!(stored.version, successes as u64);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callers_retrying_contention_eventually_apply_everything() {
    const WRITERS: i64 = 12;

    let store = seeded(&[profile("u1", 0, 0)]);
    let coordinator = Arc::new(coordinator_with(store.clone(), fast_backoff()));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                for _ in 0..1000 {
                    let result = coordinator
                        .increment_field("u1", "subProfile.tone", 1, true)
                        .await;
                    match result.error_kind() {
                        None => return,
                        Some(kind) if kind.is_retryable_by_caller() => {
                            tokio::time::sleep(Duration::from_millis(1)).await
                        }
                        Some(kind) => panic!("unexpected {:?}", kind),
                    }
                }
                panic!("writer never got through");
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = store.read("u1").await.unwrap().unwrap();
    assert_eq!(stored.get("subProfile.tone"), Some(json!(WRITERS)));
    assert_eq!(stored.version, WRITERS as u64);
}

// ============================================================================
// Bounded CAS retries
// ============================================================================

#[tokio::test(start_paused = true)]
async fn racing_writer_exhausts_exactly_max_retries() {
    let store = seeded(&[profile("u1", 7, 3)]);
    let counting = CountingStore::new(RacingStore::new(store.clone()));
    let coordinator = coordinator(counting.clone());

    let start = Instant::now();
    let result = coordinator
        .update_field("u1", "subProfile.tone", 9, true)
        .await;
    let elapsed = start.elapsed();

    assert_eq!(result.error_kind(), Some(ErrorKind::Conflict));
    assert_eq!(result.retry_count(), 3);
    assert_eq!(counting.reads(), 3);
    assert_eq!(counting.writes(), 3);
    assert_eq!(counting.mismatches(), 3);
    // 100ms + 200ms between the three attempts, none after the last.
    assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(400), "{:?}", elapsed);

    let stored = store.read("u1").await.unwrap().unwrap();
    assert_eq!(stored.version, 10);
    assert_eq!(stored.get("subProfile.tone"), Some(json!(3)));
    assert!(!coordinator.lock().store().is_held("lock:profile:u1"));
}

#[tokio::test(start_paused = true)]
async fn retry_budget_follows_config() {
    let store = seeded(&[profile("u1", 7, 3)]);
    let counting = CountingStore::new(RacingStore::new(store));
    let coordinator = coordinator_with(counting.clone(), CoordinatorConfig::new().with_max_retries(5));

    let start = Instant::now();
    let result = coordinator.update_field("u1", "x", 1, false).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Conflict));
    assert_eq!(result.retry_count(), 5);
    assert_eq!(counting.reads(), 5);
    assert_eq!(counting.mismatches(), 5);
    // 100 + 200 + 400 + 800
    assert!(start.elapsed() >= Duration::from_millis(1500));
    assert!(start.elapsed() < Duration::from_millis(1600));
}

// ============================================================================
// Non-retryable short-circuit
// ============================================================================

#[tokio::test(start_paused = true)]
async fn missing_record_short_circuits() {
    let counting = CountingStore::new(seeded(&[]));
    let coordinator = coordinator(counting.clone());

    let start = Instant::now();
    let result = coordinator.update_field("ghost", "x", 1, true).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
    assert_eq!(result.retry_count(), 0);
    assert_eq!(counting.reads(), 1);
    assert_eq!(counting.writes(), 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_lock_free(&coordinator, "ghost").await;
}

#[tokio::test(start_paused = true)]
async fn missing_sub_profile_short_circuits() {
    let store = seeded(&[Record::new("u1").with_version(7)]);
    let counting = CountingStore::new(store.clone());
    let coordinator = coordinator(counting.clone());

    let start = Instant::now();
    let result = coordinator
        .increment_field("u1", "subProfile.tone", 2, true)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::InvalidState));
    assert_eq!(result.retry_count(), 0);
    assert_eq!(counting.reads(), 1);
    assert_eq!(counting.writes(), 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(store.read("u1").await.unwrap().unwrap().version, 7);
    assert!(coordinator.caches().invalidations().is_empty());
    assert_lock_free(&coordinator, "u1").await;
}

// ============================================================================
// Lock always released
// ============================================================================

#[tokio::test]
async fn lock_released_when_store_panics() {
    let store = seeded(&[profile("u1", 7, 3)]);
    let coordinator = Arc::new(coordinator(FaultyStore::new(store.clone()).panic_on_write()));

    let task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.update_field("u1", "x", 1, true).await })
    };
    let err = task.await.unwrap_err();

    assert!(err.is_panic());
    assert!(coordinator.lock().acquire("u1").await.unwrap());
    assert_eq!(store.read("u1").await.unwrap().unwrap().version, 7);
}
