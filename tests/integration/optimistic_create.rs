//! End-to-end create flow: optimistic placeholder visibility, retry on
//! transient failure, and convergence with server-assigned identity.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tasklane::cache::CacheCoordinator;
use tasklane::mutate::{MutateError, MutationEngine, MutationEvent, MutationStatus, RetryPolicy, StaticPrompt};
use tasklane::transport::TransportError;
use tasklane::transport::memory::MemoryTransport;
use tasklane_model::task::{NewTask, Task, TaskId};

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

fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: "details".to_string(),
        assignee: "Al".to_string(),
        completed: false,
    }
}

fn engine(
    cache: &Arc<CacheCoordinator>,
    transport: &Arc<MemoryTransport>,
) -> (
    MutationEngine<MemoryTransport, StaticPrompt>,
    tokio::sync::mpsc::Receiver<MutationEvent>,
) {
    MutationEngine::new(
        Arc::clone(cache),
        Arc::clone(transport),
        StaticPrompt::new(true),
        RetryPolicy::default(),
        8,
    )
}

#[tokio::test(start_paused = true)]
async fn placeholder_is_visible_while_the_call_is_in_flight() {
    let cache = Arc::new(CacheCoordinator::new());
    cache.set_flat_tasks(vec![task("5")]);
    let transport = Arc::new(MemoryTransport::seeded(vec![task("8")]));
    transport.set_latency(Duration::from_millis(500));

    let (engine, mut events) = engine(&cache, &transport);
    let engine = Arc::new(engine);

    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.create(new_task("new task")).await }
    });

    // Let the mutation reach its transport call, then look at the cache
    // mid-flight: the placeholder leads the list with a pending id.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mid_flight = cache.flat_tasks().unwrap();
    assert_eq!(mid_flight.len(), 2);
    assert!(mid_flight[0].id.is_pending());
    assert_eq!(mid_flight[0].title, "new task");
    assert_eq!(mid_flight[1].id, TaskId::confirmed("5"));
    assert!(engine.create_state().is_pending());

    let created = handle.await.unwrap().unwrap();
    assert_eq!(created.id, TaskId::confirmed("9"));

    // Converged: placeholder gone, server identity in its place, ordered.
    let settled = cache.flat_tasks().unwrap();
    let ids: Vec<_> = settled.iter().map(|t| t.id.to_string()).collect();
    assert_eq!(ids, ["9", "5"]);
    assert!(settled.iter().all(|t| !t.id.is_pending()));

    assert_eq!(engine.create_state(), MutationStatus::Success);
    assert_eq!(events.try_recv().unwrap(), MutationEvent::NavigateBack);
    // Settled caches are marked for reconciliation on the next read.
    assert!(!cache.flat_is_fresh(Duration::from_secs(300)));
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_until_success() {
    let cache = Arc::new(CacheCoordinator::new());
    cache.set_flat_tasks(Vec::new());
    let transport = Arc::new(MemoryTransport::new());
    transport.fail_next(TransportError::Network("connection reset".to_string()));
    transport.fail_next(TransportError::Timeout);

    let (engine, _events) = engine(&cache, &transport);
    let created = engine.create(new_task("eventually")).await.unwrap();

    assert_eq!(created.id, TaskId::confirmed("1"));
    assert_eq!(transport.calls().create, 3);
    assert_eq!(engine.create_state(), MutationStatus::Success);
    assert_eq!(cache.flat_tasks().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn placeholder_lands_in_the_first_page_of_every_configuration() {
    let cache = Arc::new(CacheCoordinator::new());
    cache.set_pages(
        10,
        vec![tasklane_model::page::TaskPage::from_items(
            vec![task("5")],
            1,
            10,
        )],
    );
    cache.set_pages(
        20,
        vec![tasklane_model::page::TaskPage::from_items(
            vec![task("5")],
            1,
            20,
        )],
    );
    let transport = Arc::new(MemoryTransport::seeded(vec![task("5")]));

    let (engine, _events) = engine(&cache, &transport);
    engine.create(new_task("spanning")).await.unwrap();

    for limit in [10usize, 20] {
        let pages = cache.pages(limit).unwrap();
        let first = &pages[0].data;
        assert_eq!(first[0].id, TaskId::confirmed("6"));
        assert!(first.iter().all(|t| !t.id.is_pending()));
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_roll_back_and_alert_once() {
    let cache = Arc::new(CacheCoordinator::new());
    cache.set_flat_tasks(vec![task("5")]);
    let transport = Arc::new(MemoryTransport::new());
    for _ in 0..3 {
        transport.fail_next(TransportError::Timeout);
    }

    let prompt = StaticPrompt::new(true);
    let (engine, _events) = MutationEngine::new(
        Arc::clone(&cache),
        Arc::clone(&transport),
        prompt.clone(),
        RetryPolicy::default(),
        8,
    );

    let result = engine.create(new_task("doomed")).await;
    assert!(matches!(result, Err(MutateError::Transport(_))));
    assert_eq!(transport.calls().create, 3);

    // The cache is back to its pre-mutation contents.
    let tasks = cache.flat_tasks().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, TaskId::confirmed("5"));

    let alerts = prompt.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0], "request timed out");
    assert_eq!(
        engine.create_state(),
        MutationStatus::Error("request timed out".to_string())
    );
}
