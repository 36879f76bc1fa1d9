//! Fetch engine for the unpaginated task collection.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use tasklane_model::order::sort_tasks;

use crate::cache::CacheCoordinator;
use crate::transport::{TaskTransport, TransportError};

use super::{DEFAULT_STALE_AFTER, FetchStatus, TaskListView};

/// Loads the full task collection into the flat cache family.
///
/// The flat cache is the view the mutation engine applies optimistic
/// writes to first, so it is kept ordered at all times.
pub struct FlatFetcher<T: TaskTransport> {
    cache: Arc<CacheCoordinator>,
    transport: Arc<T>,
    stale_after: Duration,
    status: Mutex<FetchStatus>,
}

impl<T: TaskTransport> FlatFetcher<T> {
    /// Creates a fetcher with the default staleness window.
    pub fn new(cache: Arc<CacheCoordinator>, transport: Arc<T>) -> Self {
        Self::with_staleness(cache, transport, DEFAULT_STALE_AFTER)
    }

    /// Creates a fetcher with an explicit staleness window.
    pub fn with_staleness(
        cache: Arc<CacheCoordinator>,
        transport: Arc<T>,
        stale_after: Duration,
    ) -> Self {
        Self {
            cache,
            transport,
            stale_after,
            status: Mutex::new(FetchStatus::Idle),
        }
    }

    /// Mount entry point: reuses the cached list within the staleness
    /// window, otherwise fetches it.
    pub async fn ensure_loaded(&self) {
        if self.cache.flat_is_fresh(self.stale_after) {
            let mut status = self.status.lock();
            if *status == FetchStatus::Idle {
                *status = FetchStatus::Ready;
            }
            return;
        }
        self.load().await;
    }

    /// Unconditionally re-fetches the collection.
    pub async fn refetch(&self) {
        self.load().await;
    }

    /// Snapshot for UI consumption. `is_fetching_next_page` and
    /// `has_next_page` are always false for the flat view.
    #[must_use]
    pub fn view(&self) -> TaskListView {
        let status = self.status.lock().clone();
        let mut tasks = self.cache.flat_tasks().unwrap_or_default();
        sort_tasks(&mut tasks);
        TaskListView {
            tasks,
            is_loading: status == FetchStatus::Loading,
            is_fetching: status.is_fetching(),
            is_fetching_next_page: false,
            has_next_page: false,
            error: match &status {
                FetchStatus::Error(message) => Some(message.clone()),
                _ => None,
            },
            status,
        }
    }

    async fn load(&self) {
        {
            let mut status = self.status.lock();
            if status.is_fetching() {
                return;
            }
            *status = FetchStatus::Loading;
        }

        let cancel = self.cache.flat_fetch_token();
        match self.transport.fetch_all(&cancel).await {
            Ok(mut tasks) => {
                sort_tasks(&mut tasks);
                self.cache.set_flat_tasks(tasks);
                *self.status.lock() = FetchStatus::Ready;
            }
            Err(TransportError::Cancelled) => {
                tracing::debug!("flat fetch superseded");
                let mut status = self.status.lock();
                *status = if self.cache.flat_tasks().is_some() {
                    FetchStatus::Ready
                } else {
                    FetchStatus::Idle
                };
            }
            Err(err) => {
                tracing::warn!(error = %err, "flat fetch failed");
                *self.status.lock() = FetchStatus::Error(err.to_string());
            }
        }
    }
}
