//! Fetch engines over the transport contract.
//!
//! [`pages::PagedFetcher`] drives forward-only pagination for one page-size
//! configuration; [`flat::FlatFetcher`] loads the unpaginated collection;
//! [`detail::DetailFetcher`] loads single tasks. All three read and write
//! the shared [`CacheCoordinator`](crate::cache::CacheCoordinator), reuse
//! cached data within a staleness window, and bind every request to a
//! coordinator-issued cancellation token so mutations can supersede them.
//! Nothing refetches on focus events; staleness or explicit refetch drives
//! every request.

pub mod detail;
pub mod flat;
pub mod pages;

pub use detail::DetailFetcher;
pub use flat::FlatFetcher;
pub use pages::PagedFetcher;

/// Default staleness window for fetched data.
pub const DEFAULT_STALE_AFTER: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Lifecycle of a fetch engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Nothing has been requested yet.
    #[default]
    Idle,
    /// The first page (or full list) is being fetched.
    Loading,
    /// Data is available.
    Ready,
    /// Data is available and the next page is being fetched.
    LoadingNext,
    /// The last fetch failed; the caller may retry via `refetch`.
    Error(String),
}

impl FetchStatus {
    /// Whether any request is currently in flight.
    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        matches!(self, Self::Loading | Self::LoadingNext)
    }
}

/// Snapshot of a list fetch engine for UI consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListView {
    /// The flattened, ordered task list.
    pub tasks: Vec<tasklane_model::task::Task>,
    /// True during the initial load.
    pub is_loading: bool,
    /// True while any request is in flight.
    pub is_fetching: bool,
    /// True while a next-page request is in flight.
    pub is_fetching_next_page: bool,
    /// Whether another page is believed to exist.
    pub has_next_page: bool,
    /// Current engine status.
    pub status: FetchStatus,
    /// Message of the last failure, if the engine is in the error state.
    pub error: Option<String>,
}
