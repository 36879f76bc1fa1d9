//! Tasklane — optimistic task client library.
//!
//! Layers optimistic mutations and cache reconciliation over a paginated
//! REST task collection: a [`cache::CacheCoordinator`] holds the flat,
//! paginated, and per-id cache families; [`fetch`] drives list and page
//! loading with a staleness window; [`mutate::MutationEngine`] performs
//! create/update/delete with optimistic local application, rollback on
//! failure, and retry with exponential backoff.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod mutate;
pub mod net;
pub mod transport;
