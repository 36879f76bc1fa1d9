//! In-process transport fake for tests and offline use.
//!
//! Holds the "server" task collection in memory, assigns monotonically
//! increasing numeric ids on create, and supports per-call failure
//! injection, artificial latency, and call counting so tests can exercise
//! retry, rollback, and cancellation paths deterministically.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use tasklane_model::task::{NewTask, Task, TaskId, TaskPatch};

use super::{TaskTransport, TransportError};

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Number of `fetch_all` calls.
    pub fetch_all: usize,
    /// Number of `fetch_page` calls.
    pub fetch_page: usize,
    /// Number of `fetch_by_id` calls.
    pub fetch_by_id: usize,
    /// Number of `create` calls.
    pub create: usize,
    /// Number of `update` calls.
    pub update: usize,
    /// Number of `delete` calls.
    pub delete: usize,
}

struct Inner {
    tasks: Vec<Task>,
    next_id: u64,
    failures: VecDeque<TransportError>,
    latency: Option<Duration>,
    calls: CallCounts,
}

/// In-memory implementation of [`TaskTransport`].
pub struct MemoryTransport {
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::seeded(Vec::new())
    }

    /// Creates a transport pre-populated with the given tasks.
    ///
    /// The next created task gets an id one above the highest numeric id
    /// in the seed.
    #[must_use]
    pub fn seeded(tasks: Vec<Task>) -> Self {
        let next_id = tasks
            .iter()
            .filter_map(|t| t.id.as_confirmed().and_then(|id| id.parse::<u64>().ok()))
            .max()
            .map_or(1, |max| max + 1);
        Self {
            inner: Mutex::new(Inner {
                tasks,
                next_id,
                failures: VecDeque::new(),
                latency: None,
                calls: CallCounts::default(),
            }),
        }
    }

    /// Queues a failure to be returned by the next operation. Queued
    /// failures are consumed in order, one per call, before any real work.
    pub fn fail_next(&self, err: TransportError) {
        self.inner.lock().failures.push_back(err);
    }

    /// Sets an artificial delay applied before each operation completes.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = Some(latency);
    }

    /// Clears any artificial delay.
    pub fn clear_latency(&self) {
        self.inner.lock().latency = None;
    }

    /// Returns a snapshot of the per-operation call counters.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.inner.lock().calls
    }

    /// Returns a snapshot of the server-side task collection.
    #[must_use]
    pub fn server_tasks(&self) -> Vec<Task> {
        self.inner.lock().tasks.clone()
    }

    /// Waits out the artificial latency (if any), honoring cancellation,
    /// then consumes one queued failure (if any).
    async fn gate(&self, cancel: &CancellationToken) -> Result<(), TransportError> {
        let latency = self.inner.lock().latency;
        if let Some(delay) = latency {
            tokio::select! {
                () = cancel.cancelled() => return Err(TransportError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if let Some(err) = self.inner.lock().failures.pop_front() {
            return Err(err);
        }
        Ok(())
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTransport for MemoryTransport {
    async fn fetch_all(&self, cancel: &CancellationToken) -> Result<Vec<Task>, TransportError> {
        self.inner.lock().calls.fetch_all += 1;
        self.gate(cancel).await?;
        Ok(self.inner.lock().tasks.clone())
    }

    async fn fetch_page(
        &self,
        page: u32,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Task>, TransportError> {
        self.inner.lock().calls.fetch_page += 1;
        self.gate(cancel).await?;
        let inner = self.inner.lock();
        let start = (page.saturating_sub(1) as usize).saturating_mul(limit);
        Ok(inner.tasks.iter().skip(start).take(limit).cloned().collect())
    }

    async fn fetch_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Task, TransportError> {
        self.inner.lock().calls.fetch_by_id += 1;
        self.gate(cancel).await?;
        self.inner
            .lock()
            .tasks
            .iter()
            .find(|t| t.id.is(id))
            .cloned()
            .ok_or(TransportError::Http { status: 404 })
    }

    async fn create(
        &self,
        task: &NewTask,
        cancel: &CancellationToken,
    ) -> Result<Task, TransportError> {
        self.inner.lock().calls.create += 1;
        self.gate(cancel).await?;
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let created = Task {
            id: TaskId::confirmed(id.to_string()),
            title: task.title.clone(),
            description: task.description.clone(),
            assignee: task.assignee.clone(),
            completed: task.completed,
            created_at: Utc::now(),
        };
        inner.tasks.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: &str,
        patch: &TaskPatch,
        cancel: &CancellationToken,
    ) -> Result<Task, TransportError> {
        self.inner.lock().calls.update += 1;
        self.gate(cancel).await?;
        let mut inner = self.inner.lock();
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.id.is(id))
            .ok_or(TransportError::Http { status: 404 })?;
        *task = patch.apply_to(task);
        Ok(task.clone())
    }

    async fn delete(&self, id: &str, cancel: &CancellationToken) -> Result<(), TransportError> {
        self.inner.lock().calls.delete += 1;
        self.gate(cancel).await?;
        let mut inner = self.inner.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| !t.id.is(id));
        if inner.tasks.len() == before {
            return Err(TransportError::Http { status: 404 });
        }
        Ok(())
    }
}
