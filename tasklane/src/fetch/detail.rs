//! Fetch engine for per-id detail entries.

use std::sync::Arc;
use std::time::Duration;

use tasklane_model::task::Task;

use crate::cache::CacheCoordinator;
use crate::transport::{TaskTransport, TransportError};

use super::DEFAULT_STALE_AFTER;

/// Loads single tasks into the detail cache family.
pub struct DetailFetcher<T: TaskTransport> {
    cache: Arc<CacheCoordinator>,
    transport: Arc<T>,
    stale_after: Duration,
}

impl<T: TaskTransport> DetailFetcher<T> {
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
        }
    }

    /// Returns the task with the given confirmed id, from cache when fresh,
    /// otherwise from the server.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the fetch fails; `Cancelled` means the
    /// load was superseded by a mutation and should be silently dropped.
    pub async fn load(&self, id: &str) -> Result<Task, TransportError> {
        if self.cache.detail_is_fresh(id, self.stale_after)
            && let Some(task) = self.cache.detail(id)
        {
            return Ok(task);
        }
        let cancel = self.cache.detail_fetch_token(id);
        let task = self.transport.fetch_by_id(id, &cancel).await?;
        self.cache.set_detail(id, task.clone());
        Ok(task)
    }
}
