//! Mutation engine: create/update/delete with optimistic local visibility,
//! guaranteed rollback, and cache-wide reconciliation.
//!
//! Every mutation runs the same strictly sequential protocol:
//!
//! 1. Cancel overlapping in-flight fetches so a late response cannot
//!    clobber the optimistic write.
//! 2. Snapshot the flat cache, every paginated configuration, and (for
//!    update/delete) the per-id detail entry.
//! 3. Apply the optimistic projection to every cache family, then re-sort.
//! 4. Issue the remote call, retrying transient failures with exponential
//!    backoff.
//! 5. On success, reconcile placeholders with server truth.
//! 6. On failure, restore the step-2 snapshot verbatim and surface a
//!    user-facing notice. A canceled call is superseded, not failed: it
//!    rolls back silently, with no notice and no error status.
//! 7. Always settle by invalidating the touched cache families, so the
//!    next read reconciles against the server.
//!
//! Snapshots are mutation-local; concurrent mutations each carry their own
//! cancel/snapshot/apply/resolve sequence, with last-snapshot-wins on
//! overlapping rollbacks.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tasklane_model::order::sort_tasks;
use tasklane_model::task::{NewTask, Task, TaskPatch, ValidationError};

use crate::cache::{CacheCoordinator, CacheSnapshot};
use crate::transport::{TaskTransport, TransportError};

/// Errors surfaced from a mutation.
#[derive(Debug, thiserror::Error)]
pub enum MutateError {
    /// A field failed validation before dispatch.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The remote call failed after exhausting the retry budget.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Retry policy for the remote call of a mutation.
///
/// Applies to the transport call only; the optimistic-apply and rollback
/// bookkeeping runs exactly once per mutation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of automatic retries after the initial attempt.
    pub retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub backoff_base: Duration,
    /// Upper bound on the backoff delay.
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_before_retry(&self, attempt: u32) -> Duration {
        let doubled = self
            .backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        doubled.min(self.backoff_cap)
    }
}

/// Lifecycle of one mutation kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationStatus {
    /// No mutation of this kind is running.
    #[default]
    Idle,
    /// A mutation is in flight.
    Pending,
    /// The last mutation of this kind succeeded.
    Success,
    /// The last mutation of this kind failed with this user-facing message.
    Error(String),
}

impl MutationStatus {
    /// Whether a mutation of this kind is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The user-facing message of the last failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Events emitted by the [`MutationEngine`] for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent {
    /// A mutation succeeded; the UI should return to the prior screen.
    NavigateBack,
}

/// UI collaborator for confirmation gates and blocking error notices.
pub trait UserPrompt: Send + Sync {
    /// Two-choice destructive confirmation (cancel vs confirm). Resolves
    /// to whether the user confirmed.
    fn confirm_delete(&self) -> impl std::future::Future<Output = bool> + Send;

    /// Blocking error notice; resolves once the user has acknowledged it.
    fn alert(&self, message: &str) -> impl std::future::Future<Output = ()> + Send;
}

/// [`UserPrompt`] with a fixed confirmation answer that records every
/// alert. For tests and headless use.
#[derive(Debug, Clone)]
pub struct StaticPrompt {
    accept: bool,
    alerts: Arc<Mutex<Vec<String>>>,
}

impl StaticPrompt {
    /// Creates a prompt that answers every confirmation with `accept`.
    #[must_use]
    pub fn new(accept: bool) -> Self {
        Self {
            accept,
            alerts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The alert messages shown so far.
    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().clone()
    }
}

impl UserPrompt for StaticPrompt {
    async fn confirm_delete(&self) -> bool {
        self.accept
    }

    async fn alert(&self, message: &str) {
        self.alerts.lock().push(message.to_string());
    }
}

/// Orchestrates create/update/delete against the task collection.
pub struct MutationEngine<T: TaskTransport, P: UserPrompt> {
    cache: Arc<CacheCoordinator>,
    transport: Arc<T>,
    prompt: P,
    retry: RetryPolicy,
    create_status: Mutex<MutationStatus>,
    update_status: Mutex<MutationStatus>,
    delete_status: Mutex<MutationStatus>,
    event_tx: mpsc::Sender<MutationEvent>,
}

impl<T: TaskTransport, P: UserPrompt> MutationEngine<T, P> {
    /// Creates an engine over the given cache and transport.
    ///
    /// Returns the engine and a receiver for [`MutationEvent`]s that the
    /// UI layer should consume.
    pub fn new(
        cache: Arc<CacheCoordinator>,
        transport: Arc<T>,
        prompt: P,
        retry: RetryPolicy,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<MutationEvent>) {
        let (event_tx, event_rx) = mpsc::channel(event_buffer);
        let engine = Self {
            cache,
            transport,
            prompt,
            retry,
            create_status: Mutex::new(MutationStatus::Idle),
            update_status: Mutex::new(MutationStatus::Idle),
            delete_status: Mutex::new(MutationStatus::Idle),
            event_tx,
        };
        (engine, event_rx)
    }

    /// Current state of the create mutation.
    #[must_use]
    pub fn create_state(&self) -> MutationStatus {
        self.create_status.lock().clone()
    }

    /// Current state of the update mutation.
    #[must_use]
    pub fn update_state(&self) -> MutationStatus {
        self.update_status.lock().clone()
    }

    /// Current state of the delete mutation.
    #[must_use]
    pub fn delete_state(&self) -> MutationStatus {
        self.delete_status.lock().clone()
    }

    /// Creates a task with optimistic insertion.
    ///
    /// # Errors
    ///
    /// Returns [`MutateError::Validation`] before any cache is touched, or
    /// [`MutateError::Transport`] after rollback when the remote call
    /// fails.
    pub async fn create(&self, input: NewTask) -> Result<Task, MutateError> {
        input.validate()?;
        *self.create_status.lock() = MutationStatus::Pending;

        self.cache.cancel_task_fetches();
        let snapshot = Some(self.cache.snapshot(None));

        let optimistic = input.to_optimistic();
        self.cache.update_flat(|tasks| {
            tasks.insert(0, optimistic.clone());
            sort_tasks(tasks);
        });
        self.cache.update_paginated_pages(|pages| {
            if let Some(first) = pages.first_mut() {
                first.data.insert(0, optimistic.clone());
                sort_tasks(&mut first.data);
            }
        });

        let result = self
            .call_with_retry(|| async {
                let cancel = CancellationToken::new();
                self.transport.create(&input, &cancel).await
            })
            .await;

        let outcome = match result {
            Ok(created) => {
                // Replace the placeholder with server truth everywhere.
                self.cache.update_flat(|tasks| {
                    tasks.retain(|t| !t.id.is_pending());
                    tasks.insert(0, created.clone());
                    sort_tasks(tasks);
                });
                self.cache.update_paginated_pages(|pages| {
                    for page in pages.iter_mut() {
                        page.data.retain(|t| !t.id.is_pending());
                    }
                    if let Some(first) = pages.first_mut() {
                        first.data.insert(0, created.clone());
                        sort_tasks(&mut first.data);
                    }
                });
                *self.create_status.lock() = MutationStatus::Success;
                let _ = self.event_tx.try_send(MutationEvent::NavigateBack);
                Ok(created)
            }
            Err(TransportError::Cancelled) => {
                // Superseded, not failed: undo quietly, no notice.
                self.rollback(snapshot);
                tracing::debug!("create superseded before completion");
                *self.create_status.lock() = MutationStatus::Idle;
                Err(TransportError::Cancelled.into())
            }
            Err(err) => {
                self.rollback(snapshot);
                let message = err.user_message("Failed to create task. Please try again.");
                tracing::error!(error = %err, "create task failed");
                self.prompt.alert(&message).await;
                *self.create_status.lock() = MutationStatus::Error(message);
                Err(err.into())
            }
        };

        self.cache.invalidate_tasks();
        outcome
    }

    /// Applies a partial update with optimistic merge.
    ///
    /// # Errors
    ///
    /// Returns [`MutateError::Validation`] before any cache is touched, or
    /// [`MutateError::Transport`] after rollback when the remote call
    /// fails.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, MutateError> {
        patch.validate()?;
        *self.update_status.lock() = MutationStatus::Pending;

        self.cache.cancel_task_fetches();
        self.cache.cancel_detail_fetch(id);
        let snapshot = Some(self.cache.snapshot(Some(id)));

        self.cache.update_flat(|tasks| {
            for task in tasks.iter_mut() {
                if task.id.is(id) {
                    *task = patch.apply_to(task);
                }
            }
            sort_tasks(tasks);
        });
        self.cache.update_paginated_pages(|pages| {
            for page in pages {
                for task in &mut page.data {
                    if task.id.is(id) {
                        *task = patch.apply_to(task);
                    }
                }
                sort_tasks(&mut page.data);
            }
        });
        self.cache.update_detail(id, |task| *task = patch.apply_to(task));

        let result = self
            .call_with_retry(|| async {
                let cancel = CancellationToken::new();
                self.transport.update(id, &patch, &cancel).await
            })
            .await;

        let outcome = match result {
            Ok(updated) => {
                // Cache correctness is finalized by invalidation below.
                *self.update_status.lock() = MutationStatus::Success;
                let _ = self.event_tx.try_send(MutationEvent::NavigateBack);
                Ok(updated)
            }
            Err(TransportError::Cancelled) => {
                self.rollback(snapshot);
                tracing::debug!(task_id = id, "update superseded before completion");
                *self.update_status.lock() = MutationStatus::Idle;
                Err(TransportError::Cancelled.into())
            }
            Err(err) => {
                self.rollback(snapshot);
                let message = err.user_message("Failed to update task. Please try again.");
                tracing::error!(task_id = id, error = %err, "update task failed");
                self.prompt.alert(&message).await;
                *self.update_status.lock() = MutationStatus::Error(message);
                Err(err.into())
            }
        };

        self.cache.invalidate_tasks();
        self.cache.invalidate_detail(id);
        outcome
    }

    /// Deletes a task with optimistic removal.
    ///
    /// # Errors
    ///
    /// Returns [`MutateError::Transport`] after rollback when the remote
    /// call fails.
    pub async fn delete(&self, id: &str) -> Result<(), MutateError> {
        *self.delete_status.lock() = MutationStatus::Pending;

        self.cache.cancel_task_fetches();
        self.cache.cancel_detail_fetch(id);
        let snapshot = Some(self.cache.snapshot(Some(id)));

        self.cache.update_flat(|tasks| tasks.retain(|t| !t.id.is(id)));
        self.cache.update_paginated_pages(|pages| {
            for page in pages {
                page.data.retain(|t| !t.id.is(id));
            }
        });
        self.cache.remove_detail(id);

        let result = self
            .call_with_retry(|| async {
                let cancel = CancellationToken::new();
                self.transport.delete(id, &cancel).await
            })
            .await;

        let outcome = match result {
            Ok(()) => {
                *self.delete_status.lock() = MutationStatus::Success;
                let _ = self.event_tx.try_send(MutationEvent::NavigateBack);
                Ok(())
            }
            Err(TransportError::Cancelled) => {
                self.rollback(snapshot);
                tracing::debug!(task_id = id, "delete superseded before completion");
                *self.delete_status.lock() = MutationStatus::Idle;
                Err(TransportError::Cancelled.into())
            }
            Err(err) => {
                self.rollback(snapshot);
                let message = err.user_message("Failed to delete task. Please try again.");
                tracing::error!(task_id = id, error = %err, "delete task failed");
                self.prompt.alert(&message).await;
                *self.delete_status.lock() = MutationStatus::Error(message);
                Err(err.into())
            }
        };

        self.cache.invalidate_tasks();
        self.cache.invalidate_detail(id);
        outcome
    }

    /// Dispatches create or update from a full form payload.
    ///
    /// # Errors
    ///
    /// Propagates the underlying mutation error.
    pub async fn handle_save(
        &self,
        data: NewTask,
        is_editing: bool,
        id: Option<&str>,
    ) -> Result<(), MutateError> {
        if is_editing && let Some(id) = id {
            self.update(id, data.into_patch()).await.map(drop)
        } else {
            self.create(data).await.map(drop)
        }
    }

    /// Asks for destructive confirmation, then dispatches the delete. A
    /// declined confirmation is not an error and touches nothing.
    ///
    /// # Errors
    ///
    /// Propagates the underlying mutation error.
    pub async fn handle_delete(&self, id: &str) -> Result<(), MutateError> {
        if !self.prompt.confirm_delete().await {
            return Ok(());
        }
        self.delete(id).await
    }

    /// Retries the remote call on failure, up to the configured budget,
    /// sleeping the backoff delay between attempts. Cancellation settles
    /// immediately: a superseded call must not be replayed.
    async fn call_with_retry<F, Fut, O>(&self, mut op: F) -> Result<O, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<O, TransportError>>,
    {
        let mut last_err = None;
        for attempt in 0..=self.retry.retries {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay_before_retry(attempt)).await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(TransportError::Cancelled) => return Err(TransportError::Cancelled),
                Err(err) => {
                    tracing::debug!(
                        attempt,
                        max_retries = self.retry.retries,
                        error = %err,
                        "remote call failed, will retry"
                    );
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| unreachable!("loop ran at least once")))
    }

    /// Restores the pre-mutation snapshot. When the snapshot is missing,
    /// degrades to clearing the optimistic entries so the caches are at
    /// least placeholder-free.
    fn rollback(&self, snapshot: Option<CacheSnapshot>) {
        match snapshot {
            Some(snapshot) => self.cache.restore(snapshot),
            None => {
                tracing::warn!("rollback target missing, clearing optimistic entries instead");
                self.cache.purge_pending();
            }
        }
    }
}
