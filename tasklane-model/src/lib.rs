//! Shared entity and ordering model for Tasklane.

pub mod order;
pub mod page;
pub mod task;
