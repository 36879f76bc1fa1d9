//! Forward-only pagination engine for one page-size configuration.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use tasklane_model::order::sort_tasks;
use tasklane_model::page::TaskPage;

use crate::cache::CacheCoordinator;
use crate::transport::{TaskTransport, TransportError};

use super::{DEFAULT_STALE_AFTER, FetchStatus, TaskListView};

/// Drives page-by-page fetching and presents a single flattened, ordered
/// list plus continuation state.
///
/// The flattened view is the ordered union of all fetched pages' data. It
/// is not deduplicated by id: if a task shifts between pages because of a
/// concurrent creation it can appear twice until the next full refetch.
pub struct PagedFetcher<T: TaskTransport> {
    cache: Arc<CacheCoordinator>,
    transport: Arc<T>,
    page_size: usize,
    stale_after: Duration,
    status: Mutex<FetchStatus>,
}

impl<T: TaskTransport> PagedFetcher<T> {
    /// Creates a fetcher for the given page size with the default
    /// staleness window.
    pub fn new(cache: Arc<CacheCoordinator>, transport: Arc<T>, page_size: usize) -> Self {
        Self::with_staleness(cache, transport, page_size, DEFAULT_STALE_AFTER)
    }

    /// Creates a fetcher with an explicit staleness window.
    pub fn with_staleness(
        cache: Arc<CacheCoordinator>,
        transport: Arc<T>,
        page_size: usize,
        stale_after: Duration,
    ) -> Self {
        Self {
            cache,
            transport,
            page_size,
            stale_after,
            status: Mutex::new(FetchStatus::Idle),
        }
    }

    /// The page size this fetcher was configured with.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether another page is believed to exist: the `has_more` flag of
    /// the most recently fetched page.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.cache
            .pages(self.page_size)
            .and_then(|pages| pages.last().map(|p| p.has_more))
            .unwrap_or(false)
    }

    /// Mount entry point: reuses cached pages within the staleness window,
    /// otherwise fetches page 1.
    pub async fn ensure_loaded(&self) {
        if self.cache.pages_are_fresh(self.page_size, self.stale_after) {
            let mut status = self.status.lock();
            if *status == FetchStatus::Idle {
                *status = FetchStatus::Ready;
            }
            return;
        }
        self.load_first_page().await;
    }

    /// Discards this configuration's page sequence and starts again from
    /// page 1.
    pub async fn refetch(&self) {
        self.cache.clear_pages(self.page_size);
        self.load_first_page().await;
    }

    /// Fetches the next page and appends it to the page sequence.
    ///
    /// A no-op while any fetch for this configuration is in flight, or
    /// when no next page is believed to exist.
    pub async fn fetch_next_page(&self) {
        let next_page = {
            let mut status = self.status.lock();
            if status.is_fetching() || !self.has_next_page() {
                return;
            }
            *status = FetchStatus::LoadingNext;
            self.cache
                .pages(self.page_size)
                .and_then(|pages| pages.last().map(|p| p.page + 1))
                .unwrap_or(1)
        };

        let cancel = self.cache.page_fetch_token(self.page_size);
        match self
            .transport
            .fetch_page(next_page, self.page_size, &cancel)
            .await
        {
            Ok(items) => {
                let page = TaskPage::from_items(items, next_page, self.page_size);
                self.cache.append_page(self.page_size, page);
                *self.status.lock() = FetchStatus::Ready;
            }
            Err(TransportError::Cancelled) => {
                tracing::debug!(page = next_page, "next-page fetch superseded");
                *self.status.lock() = FetchStatus::Ready;
            }
            Err(err) => {
                tracing::warn!(page = next_page, error = %err, "next-page fetch failed");
                *self.status.lock() = FetchStatus::Error(err.to_string());
            }
        }
    }

    /// Snapshot for UI consumption.
    #[must_use]
    pub fn view(&self) -> TaskListView {
        let status = self.status.lock().clone();
        let mut tasks: Vec<_> = self
            .cache
            .pages(self.page_size)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|p| p.data)
            .collect();
        sort_tasks(&mut tasks);
        TaskListView {
            tasks,
            is_loading: status == FetchStatus::Loading,
            is_fetching: status.is_fetching(),
            is_fetching_next_page: status == FetchStatus::LoadingNext,
            has_next_page: self.has_next_page(),
            error: match &status {
                FetchStatus::Error(message) => Some(message.clone()),
                _ => None,
            },
            status,
        }
    }

    async fn load_first_page(&self) {
        {
            let mut status = self.status.lock();
            if status.is_fetching() {
                return;
            }
            *status = FetchStatus::Loading;
        }

        let cancel = self.cache.page_fetch_token(self.page_size);
        match self.transport.fetch_page(1, self.page_size, &cancel).await {
            Ok(items) => {
                let page = TaskPage::from_items(items, 1, self.page_size);
                self.cache.set_pages(self.page_size, vec![page]);
                *self.status.lock() = FetchStatus::Ready;
            }
            Err(TransportError::Cancelled) => {
                tracing::debug!("first-page fetch superseded");
                let mut status = self.status.lock();
                *status = if self.cache.pages(self.page_size).is_some() {
                    FetchStatus::Ready
                } else {
                    FetchStatus::Idle
                };
            }
            Err(err) => {
                tracing::warn!(error = %err, "first-page fetch failed");
                *self.status.lock() = FetchStatus::Error(err.to_string());
            }
        }
    }
}
