//! Pagination value type with derived continuation state.
//!
//! The server returns a bare item list with no pagination metadata, so
//! `has_more` is inferred from page fullness: a full page is assumed to
//! imply more pages. When the remaining count is an exact multiple of the
//! page size this yields one spurious `has_more = true` followed by an
//! empty page; that behavior is kept as-is for compatibility with the
//! backing API.

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// One fetched page of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    /// The tasks on this page, in server response order.
    pub data: Vec<Task>,
    /// 1-based page number this page was fetched as.
    pub page: u32,
    /// The page size that was requested.
    pub limit: usize,
    /// Approximate count; equals `data.len()`, not authoritative.
    pub total: usize,
    /// Derived continuation flag: true iff the page came back full.
    pub has_more: bool,
}

impl TaskPage {
    /// Wraps a fetched item list, deriving `has_more` and `total`.
    #[must_use]
    pub fn from_items(data: Vec<Task>, page: u32, limit: usize) -> Self {
        let has_more = data.len() == limit;
        Self {
            total: data.len(),
            data,
            page,
            limit,
            has_more,
        }
    }
}
