//! Cache persistence round trips: restored data is immediately visible
//! but stale, age limits are enforced, and placeholders never survive.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tasklane::cache::CacheCoordinator;
use tasklane::cache::persist::{
    CACHE_STORAGE_KEY, DEFAULT_PERSIST_MAX_AGE, InMemoryKvStore, KeyValueStore, StoreError,
    persist_cache, restore_cache,
};
use tasklane::fetch::FlatFetcher;
use tasklane::transport::memory::MemoryTransport;
use tasklane_model::page::TaskPage;
use tasklane_model::task::{Task, TaskId};

fn task(id: &str) -> Task {
    Task {
        id: TaskId::confirmed(id),
        title: format!("task {id}"),
        description: String::new(),
        assignee: "Al".to_string(),
        completed: false,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn round_trip_restores_every_family_as_stale() {
    let cache = CacheCoordinator::new();
    cache.set_flat_tasks(vec![task("2"), task("1")]);
    cache.set_pages(10, vec![TaskPage::from_items(vec![task("2"), task("1")], 1, 10)]);
    cache.set_detail("1", task("1"));

    let store = InMemoryKvStore::new();
    persist_cache(&cache, &store).await.unwrap();

    let restored = CacheCoordinator::new();
    assert!(
        restore_cache(&restored, &store, DEFAULT_PERSIST_MAX_AGE)
            .await
            .unwrap()
    );

    // Values are back, byte for byte.
    assert_eq!(restored.flat_tasks(), cache.flat_tasks());
    assert_eq!(restored.pages(10), cache.pages(10));
    assert_eq!(restored.detail("1"), cache.detail("1"));

    // But nothing counts as fresh: the next read must reconcile.
    assert!(!restored.flat_is_fresh(Duration::from_secs(300)));
    assert!(!restored.pages_are_fresh(10, Duration::from_secs(300)));
    assert!(!restored.detail_is_fresh("1", Duration::from_secs(300)));
}

#[tokio::test]
async fn restored_cache_triggers_a_refetch_on_next_mount() {
    let cache = CacheCoordinator::new();
    cache.set_flat_tasks(vec![task("1")]);
    let store = InMemoryKvStore::new();
    persist_cache(&cache, &store).await.unwrap();

    let restored = Arc::new(CacheCoordinator::new());
    restore_cache(&restored, &store, DEFAULT_PERSIST_MAX_AGE)
        .await
        .unwrap();

    // The server has moved on since the cache was saved.
    let transport = Arc::new(MemoryTransport::seeded(vec![task("1"), task("2")]));
    let fetcher = FlatFetcher::new(Arc::clone(&restored), Arc::clone(&transport));

    // Stale values are shown immediately...
    assert_eq!(fetcher.view().tasks.len(), 1);
    // ...and the mount still goes to the network and reconciles.
    fetcher.ensure_loaded().await;
    assert_eq!(transport.calls().fetch_all, 1);
    assert_eq!(fetcher.view().tasks.len(), 2);
}

#[tokio::test]
async fn expired_blob_is_discarded_and_removed() {
    let saved_at = Utc::now() - chrono::Duration::hours(48);
    let blob = format!(
        r#"{{"saved_at":"{}","flat":[{{"id":"1","title":"task 1","description":"","assignee":"Al","completed":false,"createdAt":"{}"}}],"pages":[],"detail":[]}}"#,
        saved_at.to_rfc3339(),
        Utc::now().to_rfc3339(),
    );
    let store = InMemoryKvStore::new();
    store.set(CACHE_STORAGE_KEY, &blob).await.unwrap();

    let cache = CacheCoordinator::new();
    let restored = restore_cache(&cache, &store, DEFAULT_PERSIST_MAX_AGE)
        .await
        .unwrap();

    assert!(!restored);
    assert!(cache.flat_tasks().is_none());
    // The expired blob was cleaned up.
    assert_eq!(store.get(CACHE_STORAGE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn absent_blob_restores_nothing() {
    let cache = CacheCoordinator::new();
    let store = InMemoryKvStore::new();
    let restored = restore_cache(&cache, &store, DEFAULT_PERSIST_MAX_AGE)
        .await
        .unwrap();
    assert!(!restored);
    assert!(cache.flat_tasks().is_none());
}

#[tokio::test]
async fn placeholders_are_stripped_from_every_persisted_family() {
    let cache = CacheCoordinator::new();
    let mut pending = task("x");
    pending.id = TaskId::pending();
    cache.set_flat_tasks(vec![pending.clone(), task("1")]);
    cache.set_pages(
        10,
        vec![TaskPage::from_items(vec![pending, task("1")], 1, 10)],
    );

    let store = InMemoryKvStore::new();
    persist_cache(&cache, &store).await.unwrap();

    let restored = CacheCoordinator::new();
    restore_cache(&restored, &store, DEFAULT_PERSIST_MAX_AGE)
        .await
        .unwrap();

    assert_eq!(restored.flat_tasks().unwrap().len(), 1);
    assert_eq!(restored.pages(10).unwrap()[0].data.len(), 1);
    assert!(restored.flat_tasks().unwrap().iter().all(|t| !t.id.is_pending()));
}

#[tokio::test]
async fn storage_write_failure_surfaces_without_touching_the_cache() {
    let cache = CacheCoordinator::new();
    cache.set_flat_tasks(vec![task("1")]);

    let store = InMemoryKvStore::new();
    store.set_failing_writes(true);
    let err = persist_cache(&cache, &store).await.unwrap_err();
    assert!(matches!(err, StoreError::WriteFailed(_)));

    // In-memory state is unaffected by the failed write.
    assert_eq!(cache.flat_tasks().unwrap().len(), 1);
}
