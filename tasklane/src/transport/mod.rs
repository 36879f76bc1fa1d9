//! Remote transport abstraction for the task collection.
//!
//! Defines the [`TaskTransport`] trait that all transport implementations
//! must satisfy. Concrete implementations include:
//! - [`http::HttpTransport`] — reqwest-based REST client
//! - [`memory::MemoryTransport`] — in-process fake for tests and offline use
//!
//! Every operation takes a caller-supplied [`CancellationToken`]; a
//! canceled call settles as [`TransportError::Cancelled`], which is never
//! surfaced to the user — it means the call was intentionally superseded.

pub mod http;
pub mod memory;

use tokio_util::sync::CancellationToken;

use tasklane_model::task::{NewTask, Task, TaskPatch};

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    Http {
        /// The response status code.
        status: u16,
    },

    /// The request never completed at the transport level.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// The request was canceled by its cancellation token.
    #[error("request canceled")]
    Cancelled,

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether retrying this failure could plausibly succeed.
    ///
    /// Network failures, timeouts, and 408/429/5xx responses are
    /// transient; other client errors and decode failures are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Http { status } => matches!(status, 408 | 429) || *status >= 500,
            Self::Cancelled | Self::InvalidBody(_) => false,
        }
    }

    /// User-facing message for this failure.
    ///
    /// 401, 404, and 500 get specific wording; anything else falls back to
    /// the error's own display, or `default` for cancellation.
    #[must_use]
    pub fn user_message(&self, default: &str) -> String {
        match self {
            Self::Http { status: 401 } => {
                "Authentication failed. Please check your credentials.".to_string()
            }
            Self::Http { status: 404 } => "Resource not found. Please try again.".to_string(),
            Self::Http { status: 500 } => "Server error. Please try again later.".to_string(),
            Self::Cancelled => default.to_string(),
            other => other.to_string(),
        }
    }
}

/// Async CRUD + paginated fetch over the remote task collection.
///
/// All operations are independently cancelable and bounded by the
/// transport's request timeout. None of them blocks a scheduling thread.
pub trait TaskTransport: Send + Sync {
    /// Fetch the entire task collection.
    fn fetch_all(
        &self,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, TransportError>> + Send;

    /// Fetch one page of tasks (1-based page number).
    ///
    /// The server returns a bare item list; continuation state is derived
    /// by the caller from page fullness.
    fn fetch_page(
        &self,
        page: u32,
        limit: usize,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, TransportError>> + Send;

    /// Fetch a single task by its confirmed id.
    ///
    /// An absent task fails with `Http { status: 404 }`.
    fn fetch_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Task, TransportError>> + Send;

    /// Create a task. The server assigns `id` and `createdAt`.
    fn create(
        &self,
        task: &NewTask,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Task, TransportError>> + Send;

    /// Apply a partial update to the task with the given confirmed id.
    fn update(
        &self,
        id: &str,
        patch: &TaskPatch,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Task, TransportError>> + Send;

    /// Delete the task with the given confirmed id.
    fn delete(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}
