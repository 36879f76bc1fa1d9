//! Cache persistence over an opaque key-value store.
//!
//! The whole coordinator state is serialized as one JSON blob under a
//! fixed key. The core never interprets the storage format beyond that.
//! Restored data is trusted only up to a maximum age (default 24 hours);
//! anything older is discarded, and anything younger is loaded with every
//! entry marked stale so the next read reconciles against server truth.
//! Pending placeholders are transient by definition and are never
//! persisted.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use tasklane_model::page::TaskPage;
use tasklane_model::task::Task;

use super::CacheCoordinator;

/// Fixed storage key for the persisted cache blob.
pub const CACHE_STORAGE_KEY: &str = "tasklane.cache.v1";

/// Default maximum age before a persisted cache is treated as fully stale.
pub const DEFAULT_PERSIST_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors that can occur during persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying storage is full or unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write operation failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A read operation failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// The persisted blob could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Opaque key-value store the cache blob is persisted to.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Removes the value stored under `key`, if any.
    fn remove(&self, key: &str) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// Serialized form of the coordinator state.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    saved_at: DateTime<Utc>,
    flat: Option<Vec<Task>>,
    pages: Vec<(usize, Vec<TaskPage>)>,
    detail: Vec<(String, Task)>,
}

fn without_pending(tasks: Vec<Task>) -> Vec<Task> {
    tasks.into_iter().filter(|t| !t.id.is_pending()).collect()
}

/// Persists the coordinator's current values to the store.
///
/// # Errors
///
/// Returns [`StoreError`] if encoding or the store write fails.
pub async fn persist_cache<S: KeyValueStore>(
    cache: &CacheCoordinator,
    store: &S,
) -> Result<(), StoreError> {
    let (flat, pages, detail) = cache.export_state();
    let blob = PersistedCache {
        saved_at: Utc::now(),
        flat: flat.map(without_pending),
        pages: pages
            .into_iter()
            .map(|(limit, mut sequence)| {
                for page in &mut sequence {
                    page.data.retain(|t| !t.id.is_pending());
                }
                (limit, sequence)
            })
            .collect(),
        detail,
    };
    let encoded = serde_json::to_string(&blob)?;
    store.set(CACHE_STORAGE_KEY, &encoded).await
}

/// Restores persisted values into the coordinator, if a young-enough blob
/// exists. Returns whether anything was restored.
///
/// Restored entries are visible immediately but marked stale, so the next
/// read triggers a fresh fetch.
///
/// # Errors
///
/// Returns [`StoreError`] if the store read fails or the blob is corrupt.
pub async fn restore_cache<S: KeyValueStore>(
    cache: &CacheCoordinator,
    store: &S,
    max_age: Duration,
) -> Result<bool, StoreError> {
    let Some(encoded) = store.get(CACHE_STORAGE_KEY).await? else {
        return Ok(false);
    };
    let blob: PersistedCache = serde_json::from_str(&encoded)?;
    let age = Utc::now()
        .signed_duration_since(blob.saved_at)
        .to_std()
        .unwrap_or_default();
    if age > max_age {
        tracing::debug!(age_secs = age.as_secs(), "persisted cache expired, discarding");
        store.remove(CACHE_STORAGE_KEY).await?;
        return Ok(false);
    }
    cache.import_stale(blob.flat, blob.pages, blob.detail);
    Ok(true)
}

/// In-memory implementation of [`KeyValueStore`] for testing.
pub struct InMemoryKvStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl InMemoryKvStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            fail_writes: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Makes subsequent writes fail, for exercising failure handling.
    pub fn set_failing_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("storage full".to_string()));
        }
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}
