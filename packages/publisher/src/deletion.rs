//! Background deletion of assets that are no longer referenced.
//!
//! The workflow never deletes blobs inline. Names are handed to a
//! [`DeletionQueue`] and a single [`DeletionRetrier`] task deletes each one
//! with exponential backoff, independently of any request.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::retry::{BackoffPolicy, RetryAttempt, RetryDecision, RetryTracker};
use common::storage::{AssetName, AssetStore};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    /// Dropped from an article's content by an update.
    Orphaned,
    /// The owning article was deleted.
    ArticleRemoved,
    /// A banner was replaced by a new upload.
    BannerReplaced,
    /// Written by a publish attempt that rolled back.
    Compensating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    pub name: AssetName,
    pub reason: DeletionReason,
}

#[derive(Debug, Clone, Error)]
pub enum DeletionError {
    #[error("deleting {name} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        name: AssetName,
        attempts: u8,
        last_error: String,
        history: Vec<RetryAttempt>,
    },
}

/// Sending side of the deletion pipeline. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    tx: mpsc::UnboundedSender<PendingDeletion>,
}

impl DeletionQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PendingDeletion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hand a name to the retrier. Never blocks and never fails the caller.
    pub fn schedule(&self, name: AssetName, reason: DeletionReason) {
        debug!(asset = %name, ?reason, "Scheduling asset deletion");
        let pending = PendingDeletion { name, reason };
        if let Err(mpsc::error::SendError(pending)) = self.tx.send(pending) {
            warn!(
                asset = %pending.name,
                reason = ?pending.reason,
                "Deletion retrier is gone, asset leaked"
            );
        }
    }

    pub fn schedule_all(
        &self,
        names: impl IntoIterator<Item = AssetName>,
        reason: DeletionReason,
    ) {
        for name in names {
            self.schedule(name, reason);
        }
    }
}

/// Delete `name`, retrying failures with the tracker's backoff policy.
///
/// An asset that is already gone counts as deleted. Returns the number of
/// attempts made.
#[instrument(skip(store, tracker), fields(asset = %name))]
pub async fn delete_with_retry(
    store: &dyn AssetStore,
    name: &AssetName,
    tracker: &Mutex<RetryTracker>,
) -> Result<u8, DeletionError> {
    let key = name.as_str();

    loop {
        match store.delete(name).await {
            Ok(existed) => {
                let mut tracker = tracker.lock().await;
                let attempts = tracker.failures(key) + 1;
                tracker.clear(key);
                debug!(attempts, existed, "Asset deleted");
                return Ok(attempts);
            }
            Err(e) => {
                let error_str = e.to_string();
                let decision = tracker.lock().await.record_failure(key, &error_str);

                match decision {
                    RetryDecision::Retry {
                        next_attempt,
                        delay,
                    } => {
                        warn!(
                            next_attempt,
                            delay_secs = delay.as_secs(),
                            error = %e,
                            "Asset deletion failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Exhausted { history } => {
                        return Err(DeletionError::Exhausted {
                            name: name.clone(),
                            attempts: history.len() as u8,
                            last_error: error_str,
                            history,
                        });
                    }
                }
            }
        }
    }
}

/// Exhausted deletions kept for inspection; older entries are dropped first.
const EXHAUSTED_KEPT: usize = 256;

struct RetrierState {
    tracker: Mutex<RetryTracker>,
    exhausted: Mutex<VecDeque<DeletionError>>,
    pending: AtomicUsize,
}

/// Owns the receiving side of the deletion pipeline.
pub struct DeletionRetrier;

impl DeletionRetrier {
    /// Start the retrier on the current runtime.
    pub fn spawn(
        store: Arc<dyn AssetStore>,
        policy: BackoffPolicy,
    ) -> (DeletionQueue, DeletionRetrierHandle) {
        let (queue, rx) = DeletionQueue::channel();
        let state = Arc::new(RetrierState {
            tracker: Mutex::new(RetryTracker::new(policy)),
            exhausted: Mutex::new(VecDeque::new()),
            pending: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(rx, store, Arc::clone(&state), cancel.clone()));
        info!(
            max_attempts = policy.max_attempts,
            base_delay_secs = policy.base_delay.as_secs(),
            "Deletion retrier started"
        );

        (
            queue,
            DeletionRetrierHandle {
                state,
                cancel,
                task,
            },
        )
    }
}

pub struct DeletionRetrierHandle {
    state: Arc<RetrierState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DeletionRetrierHandle {
    /// Deletions accepted and not yet finished.
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// The most recent deletions that ran out of attempts. Those blobs are leaked.
    pub async fn exhausted(&self) -> Vec<DeletionError> {
        self.state.exhausted.lock().await.iter().cloned().collect()
    }

    /// Like [`exhausted`](Self::exhausted), but clears the record.
    pub async fn take_exhausted(&self) -> Vec<DeletionError> {
        self.state.exhausted.lock().await.drain(..).collect()
    }

    /// Stop immediately. In-flight retries are abandoned and logged.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the retrier to stop.
    ///
    /// Without [`shutdown`](Self::shutdown) this returns once every
    /// [`DeletionQueue`] clone is dropped and all accepted work is done.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "Deletion retrier task failed");
        }
    }
}

type TaskOutcome = (PendingDeletion, Result<u8, DeletionError>);

async fn run(
    mut rx: mpsc::UnboundedReceiver<PendingDeletion>,
    store: Arc<dyn AssetStore>,
    state: Arc<RetrierState>,
    cancel: CancellationToken,
) {
    let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
    let mut open = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let abandoned = state.tracker.lock().await.keys();
                tasks.shutdown().await;
                state.pending.store(0, Ordering::SeqCst);
                if !abandoned.is_empty() {
                    warn!(assets = ?abandoned, "Deletion retrier shut down, assets leaked");
                }
                break;
            }
            msg = rx.recv(), if open => match msg {
                Some(pending) => accept(&mut tasks, &store, &state, pending).await,
                None => open = false,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                state.pending.fetch_sub(1, Ordering::SeqCst);
                match joined {
                    Ok((pending, Ok(attempts))) => {
                        info!(
                            asset = %pending.name,
                            reason = ?pending.reason,
                            attempts,
                            "Asset deleted"
                        );
                    }
                    Ok((pending, Err(e))) => {
                        error!(
                            asset = %pending.name,
                            reason = ?pending.reason,
                            error = %e,
                            "Asset deletion exhausted, asset leaked"
                        );
                        let mut exhausted = state.exhausted.lock().await;
                        if exhausted.len() == EXHAUSTED_KEPT {
                            exhausted.pop_front();
                        }
                        exhausted.push_back(e);
                    }
                    Err(e) => error!(error = %e, "Deletion task failed"),
                }
            }
        }

        if !open && tasks.is_empty() {
            break;
        }
    }
    info!("Deletion retrier stopped");
}

async fn accept(
    tasks: &mut JoinSet<TaskOutcome>,
    store: &Arc<dyn AssetStore>,
    state: &Arc<RetrierState>,
    pending: PendingDeletion,
) {
    {
        let mut tracker = state.tracker.lock().await;
        if tracker.is_tracked(pending.name.as_str()) {
            debug!(asset = %pending.name, "Deletion already in flight");
            return;
        }
        tracker.register(pending.name.as_str());
    }
    state.pending.fetch_add(1, Ordering::SeqCst);

    let store = Arc::clone(store);
    let state = Arc::clone(state);
    tasks.spawn(async move {
        let result = delete_with_retry(store.as_ref(), &pending.name, &state.tracker).await;
        (pending, result)
    });
}
