//! Failure paths of update and delete: optimistic projections must be
//! rolled back verbatim across every cache family, with exactly one
//! user-facing notice per failed mutation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tasklane::cache::CacheCoordinator;
use tasklane::mutate::{MutateError, MutationEngine, MutationStatus, RetryPolicy, StaticPrompt};
use tasklane::transport::TransportError;
use tasklane::transport::memory::MemoryTransport;
use tasklane_model::page::TaskPage;
use tasklane_model::task::{Task, TaskId, TaskPatch};

fn task(id: &str, completed: bool) -> Task {
    Task {
        id: TaskId::confirmed(id),
        title: format!("task {id}"),
        description: String::new(),
        assignee: "Al".to_string(),
        completed,
        created_at: Utc::now(),
    }
}

/// Cache seeded across all three families, plus a matching server.
fn seeded() -> (Arc<CacheCoordinator>, Arc<MemoryTransport>) {
    let tasks = vec![task("2", false), task("1", false)];
    let cache = Arc::new(CacheCoordinator::new());
    cache.set_flat_tasks(tasks.clone());
    cache.set_pages(10, vec![TaskPage::from_items(tasks.clone(), 1, 10)]);
    cache.set_detail("1", task("1", false));
    let transport = Arc::new(MemoryTransport::seeded(tasks));
    (cache, transport)
}

fn engine(
    cache: &Arc<CacheCoordinator>,
    transport: &Arc<MemoryTransport>,
    prompt: StaticPrompt,
) -> MutationEngine<MemoryTransport, StaticPrompt> {
    let (engine, _events) = MutationEngine::new(
        Arc::clone(cache),
        Arc::clone(transport),
        prompt,
        RetryPolicy::default(),
        8,
    );
    engine
}

#[tokio::test(start_paused = true)]
async fn failed_delete_restores_every_family_and_alerts_once() {
    let (cache, transport) = seeded();
    for _ in 0..3 {
        transport.fail_next(TransportError::Http { status: 500 });
    }
    let before = cache.snapshot(Some("1"));

    let prompt = StaticPrompt::new(true);
    let engine = engine(&cache, &transport, prompt.clone());
    let result = engine.delete("1").await;

    assert!(matches!(result, Err(MutateError::Transport(_))));
    // Every queued failure consumed the retry budget.
    assert_eq!(transport.calls().delete, 3);
    // The caches are back to their exact pre-mutation contents.
    assert_eq!(cache.snapshot(Some("1")), before);
    assert!(cache.detail("1").is_some());

    let alerts = prompt.alerts();
    assert_eq!(alerts, ["Server error. Please try again later."]);
    assert_eq!(
        engine.delete_state().error(),
        Some("Server error. Please try again later.")
    );
    // Failure still settles with invalidation.
    assert!(!cache.flat_is_fresh(Duration::from_secs(300)));
    assert!(!cache.detail_is_fresh("1", Duration::from_secs(300)));
}

#[tokio::test(start_paused = true)]
async fn failed_update_undoes_the_optimistic_merge() {
    let (cache, transport) = seeded();
    for _ in 0..3 {
        transport.fail_next(TransportError::Network("reset".to_string()));
    }

    let prompt = StaticPrompt::new(true);
    let engine = engine(&cache, &transport, prompt.clone());
    let patch = TaskPatch {
        title: Some("renamed".to_string()),
        completed: Some(true),
        ..TaskPatch::default()
    };
    let result = engine.update("1", patch).await;
    assert!(matches!(result, Err(MutateError::Transport(_))));

    // No trace of the merge in any family.
    let flat = cache.flat_tasks().unwrap();
    let one = flat.iter().find(|t| t.id.is("1")).unwrap();
    assert_eq!(one.title, "task 1");
    assert!(!one.completed);
    let paged = cache.pages(10).unwrap();
    let one = paged[0].data.iter().find(|t| t.id.is("1")).unwrap();
    assert_eq!(one.title, "task 1");
    let detail = cache.detail("1").unwrap();
    assert_eq!(detail.title, "task 1");
    assert!(!detail.completed);

    assert_eq!(prompt.alerts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn optimistic_update_is_visible_before_the_call_settles() {
    let (cache, transport) = seeded();
    transport.set_latency(Duration::from_millis(500));

    let engine = Arc::new(engine(&cache, &transport, StaticPrompt::new(true)));
    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            let patch = TaskPatch {
                completed: Some(true),
                ..TaskPatch::default()
            };
            engine.update("2", patch).await
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    // The merge (and the resulting reorder) is already visible: the
    // completed task has dropped below the still-open one.
    let flat = cache.flat_tasks().unwrap();
    assert_eq!(flat[0].id, TaskId::confirmed("1"));
    assert_eq!(flat[1].id, TaskId::confirmed("2"));
    assert!(flat[1].completed);
    assert!(engine.update_state().is_pending());

    let updated = handle.await.unwrap().unwrap();
    assert!(updated.completed);
    assert_eq!(engine.update_state(), MutationStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn failed_delete_brings_the_row_back_into_the_paged_view() {
    let (cache, transport) = seeded();
    for _ in 0..3 {
        transport.fail_next(TransportError::Timeout);
    }

    let engine = engine(&cache, &transport, StaticPrompt::new(true));
    assert!(engine.delete("2").await.is_err());

    let paged = cache.pages(10).unwrap();
    assert!(paged[0].data.iter().any(|t| t.id.is("2")));
    // The server never saw a successful delete.
    assert_eq!(transport.server_tasks().len(), 2);
}

#[tokio::test]
async fn successful_delete_removes_the_row_everywhere() {
    let (cache, transport) = seeded();
    let engine = engine(&cache, &transport, StaticPrompt::new(true));

    engine.delete("1").await.unwrap();

    assert!(!cache.flat_tasks().unwrap().iter().any(|t| t.id.is("1")));
    assert!(
        !cache.pages(10).unwrap()[0]
            .data
            .iter()
            .any(|t| t.id.is("1"))
    );
    assert!(cache.detail("1").is_none());
    assert_eq!(transport.server_tasks().len(), 1);
    assert_eq!(engine.delete_state(), MutationStatus::Success);
}
