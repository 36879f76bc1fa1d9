//! Shared cache families for the task collection.
//!
//! [`CacheCoordinator`] owns three keyed cache families — the flat task
//! list, one page sequence per page-size configuration, and per-id detail
//! entries — and the in-flight cancellation tokens for fetches against
//! them. It is an explicit object injected into both the fetch and
//! mutation engines; constructing a fresh coordinator per test gives full
//! isolation.
//!
//! All reads and writes are synchronous and atomic (one lock, no
//! suspension points), and values are treated as copy-on-write: readers
//! get clones, updaters read-modify-write whole values, so a concurrent
//! reader never observes a partially updated structure.

pub mod persist;

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use tasklane_model::page::TaskPage;
use tasklane_model::task::Task;

/// One cached value with freshness metadata.
#[derive(Debug, Clone)]
struct Entry<T> {
    value: Option<T>,
    fetched_at: Option<Instant>,
    stale: bool,
}

impl<T> Entry<T> {
    const fn empty() -> Self {
        Self {
            value: None,
            fetched_at: None,
            stale: false,
        }
    }

    /// Stores a freshly fetched value.
    fn fill(&mut self, value: T) {
        self.value = Some(value);
        self.fetched_at = Some(Instant::now());
        self.stale = false;
    }

    /// Replaces the value without touching freshness metadata. Used for
    /// optimistic writes and rollback, where the data is not server truth.
    fn replace(&mut self, value: Option<T>) {
        self.value = value;
    }

    /// Marks the entry stale without deleting the value.
    fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Stores a value restored from persistence: visible but stale, so the
    /// next read reconciles against the server.
    fn fill_stale(&mut self, value: T) {
        self.value = Some(value);
        self.fetched_at = None;
        self.stale = true;
    }

    fn is_fresh(&self, window: Duration) -> bool {
        !self.stale
            && self.value.is_some()
            && self
                .fetched_at
                .is_some_and(|at| at.elapsed() < window)
    }
}

struct Inner {
    flat: Entry<Vec<Task>>,
    paginated: HashMap<usize, Entry<Vec<TaskPage>>>,
    detail: HashMap<String, Entry<Task>>,
    flat_fetch: CancellationToken,
    paginated_fetch: HashMap<usize, CancellationToken>,
    detail_fetch: HashMap<String, CancellationToken>,
}

/// Snapshot of the cache families captured before an optimistic write.
///
/// The rollback target for a failed mutation: restoring it puts every
/// captured family back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    flat: Option<Vec<Task>>,
    pages: Vec<(usize, Option<Vec<TaskPage>>)>,
    detail: Option<(String, Option<Task>)>,
}

/// Coordinator over the flat, paginated, and detail cache families.
pub struct CacheCoordinator {
    inner: Mutex<Inner>,
}

impl CacheCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                flat: Entry::empty(),
                paginated: HashMap::new(),
                detail: HashMap::new(),
                flat_fetch: CancellationToken::new(),
                paginated_fetch: HashMap::new(),
                detail_fetch: HashMap::new(),
            }),
        }
    }

    // --- flat family ---

    /// Returns a copy of the flat task list, if cached.
    #[must_use]
    pub fn flat_tasks(&self) -> Option<Vec<Task>> {
        self.inner.lock().flat.value.clone()
    }

    /// Stores a freshly fetched flat task list.
    pub fn set_flat_tasks(&self, tasks: Vec<Task>) {
        self.inner.lock().flat.fill(tasks);
    }

    /// Whether the flat list is within the staleness window.
    #[must_use]
    pub fn flat_is_fresh(&self, window: Duration) -> bool {
        self.inner.lock().flat.is_fresh(window)
    }

    /// Read-modify-write on the flat list. `f` runs only when a value is
    /// cached; the whole update is atomic.
    pub fn update_flat(&self, f: impl FnOnce(&mut Vec<Task>)) {
        let mut inner = self.inner.lock();
        if let Some(mut tasks) = inner.flat.value.take() {
            f(&mut tasks);
            inner.flat.value = Some(tasks);
        }
    }

    // --- paginated family ---

    /// Returns a copy of the page sequence for one page-size configuration.
    #[must_use]
    pub fn pages(&self, limit: usize) -> Option<Vec<TaskPage>> {
        self.inner
            .lock()
            .paginated
            .get(&limit)
            .and_then(|e| e.value.clone())
    }

    /// Stores a freshly fetched page sequence for one configuration.
    pub fn set_pages(&self, limit: usize, pages: Vec<TaskPage>) {
        self.inner
            .lock()
            .paginated
            .entry(limit)
            .or_insert_with(Entry::empty)
            .fill(pages);
    }

    /// Appends one fetched page to a configuration's sequence, refreshing
    /// its metadata.
    pub fn append_page(&self, limit: usize, page: TaskPage) {
        let mut inner = self.inner.lock();
        let entry = inner.paginated.entry(limit).or_insert_with(Entry::empty);
        let mut pages = entry.value.take().unwrap_or_default();
        pages.push(page);
        entry.fill(pages);
    }

    /// Discards the page sequence for one configuration (full refetch).
    pub fn clear_pages(&self, limit: usize) {
        if let Some(entry) = self.inner.lock().paginated.get_mut(&limit) {
            entry.replace(None);
        }
    }

    /// Whether a configuration's page sequence is within the staleness
    /// window.
    #[must_use]
    pub fn pages_are_fresh(&self, limit: usize, window: Duration) -> bool {
        self.inner
            .lock()
            .paginated
            .get(&limit)
            .is_some_and(|e| e.is_fresh(window))
    }

    /// Read-modify-write across every paginated configuration in one
    /// atomic call. `f` runs once per configuration that holds a value.
    pub fn update_paginated_pages(&self, mut f: impl FnMut(&mut Vec<TaskPage>)) {
        let mut inner = self.inner.lock();
        for entry in inner.paginated.values_mut() {
            if let Some(mut pages) = entry.value.take() {
                f(&mut pages);
                entry.value = Some(pages);
            }
        }
    }

    /// The page-size configurations currently tracked.
    #[must_use]
    pub fn page_limits(&self) -> Vec<usize> {
        self.inner.lock().paginated.keys().copied().collect()
    }

    // --- detail family ---

    /// Returns a copy of the detail entry for a confirmed id, if cached.
    #[must_use]
    pub fn detail(&self, id: &str) -> Option<Task> {
        self.inner
            .lock()
            .detail
            .get(id)
            .and_then(|e| e.value.clone())
    }

    /// Stores a freshly fetched detail entry.
    pub fn set_detail(&self, id: &str, task: Task) {
        self.inner
            .lock()
            .detail
            .entry(id.to_string())
            .or_insert_with(Entry::empty)
            .fill(task);
    }

    /// Whether a detail entry is within the staleness window.
    #[must_use]
    pub fn detail_is_fresh(&self, id: &str, window: Duration) -> bool {
        self.inner
            .lock()
            .detail
            .get(id)
            .is_some_and(|e| e.is_fresh(window))
    }

    /// Read-modify-write on one detail entry, if cached.
    pub fn update_detail(&self, id: &str, f: impl FnOnce(&mut Task)) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.detail.get_mut(id)
            && let Some(mut task) = entry.value.take()
        {
            f(&mut task);
            entry.value = Some(task);
        }
    }

    /// Drops the detail value for an id (optimistic delete).
    pub fn remove_detail(&self, id: &str) {
        if let Some(entry) = self.inner.lock().detail.get_mut(id) {
            entry.replace(None);
        }
    }

    // --- invalidation ---

    /// Marks the flat list and every paginated configuration stale.
    ///
    /// Idempotent: repeated calls produce the same stale marking with no
    /// further side effects until the next read.
    pub fn invalidate_tasks(&self) {
        let mut inner = self.inner.lock();
        inner.flat.invalidate();
        for entry in inner.paginated.values_mut() {
            entry.invalidate();
        }
    }

    /// Marks one detail entry stale. Idempotent; a no-op for ids that were
    /// never cached.
    pub fn invalidate_detail(&self, id: &str) {
        if let Some(entry) = self.inner.lock().detail.get_mut(id) {
            entry.invalidate();
        }
    }

    // --- in-flight fetch cancellation ---

    /// Token to bind a flat-list fetch to. Canceled when a mutation needs
    /// to supersede in-flight fetches.
    #[must_use]
    pub fn flat_fetch_token(&self) -> CancellationToken {
        self.inner.lock().flat_fetch.child_token()
    }

    /// Token to bind a page fetch for one configuration to.
    #[must_use]
    pub fn page_fetch_token(&self, limit: usize) -> CancellationToken {
        self.inner
            .lock()
            .paginated_fetch
            .entry(limit)
            .or_insert_with(CancellationToken::new)
            .child_token()
    }

    /// Token to bind a detail fetch to.
    #[must_use]
    pub fn detail_fetch_token(&self, id: &str) -> CancellationToken {
        self.inner
            .lock()
            .detail_fetch
            .entry(id.to_string())
            .or_insert_with(CancellationToken::new)
            .child_token()
    }

    /// Cancels every in-flight flat and paginated fetch. Idempotent when
    /// nothing is in flight.
    pub fn cancel_task_fetches(&self) {
        let mut inner = self.inner.lock();
        inner.flat_fetch.cancel();
        inner.flat_fetch = CancellationToken::new();
        for token in inner.paginated_fetch.values_mut() {
            token.cancel();
            *token = CancellationToken::new();
        }
    }

    /// Cancels an in-flight detail fetch for one id. Idempotent; a no-op
    /// when nothing is in flight.
    pub fn cancel_detail_fetch(&self, id: &str) {
        if let Some(token) = self.inner.lock().detail_fetch.get_mut(id) {
            token.cancel();
            *token = CancellationToken::new();
        }
    }

    // --- snapshot / rollback ---

    /// Captures the flat list, every paginated configuration, and (if
    /// given) one detail entry. The result is the rollback target for a
    /// failed mutation.
    #[must_use]
    pub fn snapshot(&self, detail_id: Option<&str>) -> CacheSnapshot {
        let inner = self.inner.lock();
        CacheSnapshot {
            flat: inner.flat.value.clone(),
            pages: inner
                .paginated
                .iter()
                .map(|(limit, entry)| (*limit, entry.value.clone()))
                .collect(),
            detail: detail_id.map(|id| {
                (
                    id.to_string(),
                    inner.detail.get(id).and_then(|e| e.value.clone()),
                )
            }),
        }
    }

    /// Restores a snapshot verbatim, discarding whatever optimistic state
    /// has been written since it was captured.
    pub fn restore(&self, snapshot: CacheSnapshot) {
        let mut inner = self.inner.lock();
        inner.flat.replace(snapshot.flat);
        for (limit, pages) in snapshot.pages {
            inner
                .paginated
                .entry(limit)
                .or_insert_with(Entry::empty)
                .replace(pages);
        }
        if let Some((id, task)) = snapshot.detail {
            inner.detail.entry(id).or_insert_with(Entry::empty).replace(task);
        }
    }

    /// Removes every pending-id task from the flat and paginated caches.
    ///
    /// Degraded rollback path: when no snapshot is available, clearing the
    /// optimistic entries is the best recovery we can offer.
    pub fn purge_pending(&self) {
        let mut inner = self.inner.lock();
        if let Some(tasks) = inner.flat.value.as_mut() {
            tasks.retain(|t| !t.id.is_pending());
        }
        for entry in inner.paginated.values_mut() {
            if let Some(pages) = entry.value.as_mut() {
                for page in pages {
                    page.data.retain(|t| !t.id.is_pending());
                }
            }
        }
    }

    // --- persistence support ---

    pub(crate) fn export_state(
        &self,
    ) -> (
        Option<Vec<Task>>,
        Vec<(usize, Vec<TaskPage>)>,
        Vec<(String, Task)>,
    ) {
        let inner = self.inner.lock();
        let pages = inner
            .paginated
            .iter()
            .filter_map(|(limit, e)| e.value.clone().map(|p| (*limit, p)))
            .collect();
        let detail = inner
            .detail
            .iter()
            .filter_map(|(id, e)| e.value.clone().map(|t| (id.clone(), t)))
            .collect();
        (inner.flat.value.clone(), pages, detail)
    }

    pub(crate) fn import_stale(
        &self,
        flat: Option<Vec<Task>>,
        pages: Vec<(usize, Vec<TaskPage>)>,
        detail: Vec<(String, Task)>,
    ) {
        let mut inner = self.inner.lock();
        if let Some(tasks) = flat {
            inner.flat.fill_stale(tasks);
        }
        for (limit, sequence) in pages {
            inner
                .paginated
                .entry(limit)
                .or_insert_with(Entry::empty)
                .fill_stale(sequence);
        }
        for (id, task) in detail {
            inner
                .detail
                .entry(id)
                .or_insert_with(Entry::empty)
                .fill_stale(task);
        }
    }
}

impl Default for CacheCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
