//! Registry of in-flight job sessions.
//!
//! [`JobRegistry`] tracks zero-or-many concurrently active
//! [`JobSession`](crate::session::JobSession)s, one task per key. Batch
//! reprocessing starts one independent session per input; a failure in one
//! never cancels the others. Starting a session under a key that already
//! has one cancels the prior session first — there is never more than one
//! active polling loop per key, and no orphaned loops survive replacement.
//!
//! A session removes its own entry exactly once when it reaches a terminal
//! state, then publishes [`JobEvent::SessionFinished`] as the refresh
//! signal for results-projection holders.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use sopflow_client::JobBackend;
use sopflow_core::JobId;
use sopflow_events::{EventBus, JobEvent};

use crate::poller::POLL_INTERVAL;
use crate::session::JobSession;

/// How long `shutdown` waits for each session task to exit cleanly.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Tracks all in-flight job sessions.
///
/// Created once via [`JobRegistry::new`]; the returned `Arc` is cheap to
/// clone wherever sessions are started.
pub struct JobRegistry {
    /// Active session tasks indexed by session key.
    entries: RwLock<HashMap<String, ActiveSession>>,
    backend: Arc<dyn JobBackend>,
    bus: Arc<EventBus>,
    poll_interval: Duration,
    /// Master cancellation token — cancelled during shutdown.
    cancel: CancellationToken,
}

/// Internal bookkeeping for one active session.
struct ActiveSession {
    /// Distinguishes this task from a replacement under the same key, so a
    /// superseded task never removes its successor's entry.
    session_id: Uuid,
    job_id: JobId,
    /// Per-session cancellation token (child of the master token).
    cancel: CancellationToken,
    task_handle: tokio::task::JoinHandle<()>,
}

impl JobRegistry {
    /// Create a registry polling at the standard cadence.
    pub fn new(backend: Arc<dyn JobBackend>, bus: Arc<EventBus>) -> Arc<Self> {
        Self::with_poll_interval(backend, bus, POLL_INTERVAL)
    }

    /// Create a registry with a custom polling cadence.
    pub fn with_poll_interval(
        backend: Arc<dyn JobBackend>,
        bus: Arc<EventBus>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            backend,
            bus,
            poll_interval,
            cancel: CancellationToken::new(),
        })
    }

    /// Begin tracking a job under `key`, replacing any prior session.
    ///
    /// The prior session's polling is cancelled before the replacement is
    /// inserted; cancellation is synchronous and immediate, so no further
    /// ticks fire for it.
    pub async fn start(self: &Arc<Self>, key: impl Into<String>, job_id: impl Into<JobId>) {
        let key = key.into();
        let job_id = job_id.into();

        let mut entries = self.entries.write().await;
        if let Some(prior) = entries.remove(&key) {
            tracing::info!(
                key = %key,
                prior_job_id = %prior.job_id,
                "Replacing active session",
            );
            prior.cancel.cancel();
        }

        let entry = self.spawn_session(key.clone(), job_id, false);
        entries.insert(key, entry);
    }

    /// Begin tracking a job under `key` only when no session is active for
    /// it. Returns `false` (without touching the existing session) when the
    /// key is already in flight — the duplicate-session guard for
    /// reprocessing the same input twice.
    pub async fn start_if_absent(
        self: &Arc<Self>,
        key: impl Into<String>,
        job_id: impl Into<JobId>,
    ) -> bool {
        let key = key.into();

        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            tracing::debug!(key = %key, "Session already active, not starting another");
            return false;
        }

        let entry = self.spawn_session(key.clone(), job_id.into(), false);
        entries.insert(key, entry);
        true
    }

    /// Track a job the backend reported as already complete (`reused`).
    ///
    /// The session performs its discovery/announcement pass once and
    /// finishes without polling.
    pub async fn start_completed(
        self: &Arc<Self>,
        key: impl Into<String>,
        job_id: impl Into<JobId>,
    ) {
        let key = key.into();

        let mut entries = self.entries.write().await;
        if let Some(prior) = entries.remove(&key) {
            prior.cancel.cancel();
        }

        let entry = self.spawn_session(key.clone(), job_id.into(), true);
        entries.insert(key, entry);
    }

    /// Start one independent session per `(key, job_id)` pair.
    ///
    /// Keys that already have an active session are skipped. Sessions do
    /// not affect each other: one failing leaves the rest polling.
    pub async fn start_batch(self: &Arc<Self>, jobs: Vec<(String, JobId)>) {
        for (key, job_id) in jobs {
            self.start_if_absent(key, job_id).await;
        }
    }

    /// Snapshot of the keys currently being tracked.
    ///
    /// Used to render "processing…" indicators and to disable duplicate
    /// reprocess actions.
    pub async fn active_keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Whether a session is currently active under `key`.
    pub async fn is_active(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Gracefully stop all session tasks.
    ///
    /// Cancels the master token, then waits up to [`SHUTDOWN_GRACE`] per
    /// task for a clean exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job registry");
        self.cancel.cancel();

        let mut entries = self.entries.write().await;
        for (key, entry) in entries.drain() {
            tracing::info!(key = %key, job_id = %entry.job_id, "Stopping session task");
            entry.cancel.cancel();
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, entry.task_handle).await;
        }
    }

    // ---- private helpers ----

    /// Spawn the task that drives one session to its terminal state and
    /// then removes the entry (exactly once).
    fn spawn_session(
        self: &Arc<Self>,
        key: String,
        job_id: JobId,
        already_completed: bool,
    ) -> ActiveSession {
        let session_id = Uuid::new_v4();
        let session_cancel = self.cancel.child_token();

        let registry = Arc::clone(self);
        let backend = Arc::clone(&self.backend);
        let bus = Arc::clone(&self.bus);
        let cancel = session_cancel.clone();
        let task_key = key.clone();
        let task_job_id = job_id.clone();
        let interval = self.poll_interval;

        let task_handle = tokio::spawn(async move {
            let session = JobSession::new(
                task_key.clone(),
                task_job_id.clone(),
                backend,
                Arc::clone(&bus),
            );

            let outcome = if already_completed {
                session.run_already_completed(interval).await.map(Some)
            } else {
                session.run(interval, cancel).await
            };

            match outcome {
                Ok(Some(status)) => {
                    tracing::debug!(key = %task_key, status = %status, "Session reached terminal state");
                    registry.remove_if_current(&task_key, session_id).await;
                }
                Ok(None) => {
                    // Cancelled: either replaced under this key or shut
                    // down. The replacement owns the entry now.
                    tracing::debug!(key = %task_key, "Session cancelled before terminal state");
                }
                Err(e) => {
                    tracing::error!(
                        key = %task_key,
                        job_id = %task_job_id,
                        error = %e,
                        "Session aborted",
                    );
                    registry.remove_if_current(&task_key, session_id).await;
                }
            }
        });

        ActiveSession {
            session_id,
            job_id,
            cancel: session_cancel,
            task_handle,
        }
    }

    /// Remove the entry for `key` if it still belongs to `session_id`, and
    /// publish the refresh signal. A superseded session finds a different
    /// id and leaves the entry alone.
    async fn remove_if_current(&self, key: &str, session_id: Uuid) {
        let mut entries = self.entries.write().await;
        let is_current = entries
            .get(key)
            .is_some_and(|entry| entry.session_id == session_id);

        if is_current {
            entries.remove(key);
            self.bus.publish(JobEvent::SessionFinished {
                key: key.to_string(),
            });
        }
    }
}
