//! Event envelope and broadcast bus for job-session announcements.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`JobEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use sopflow_core::{JobId, JobStatus, OutputKind};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// How an announced output reaches the subscriber.
#[derive(Debug, Clone, Serialize)]
pub enum OutputPayload {
    /// The artifact body, fetched and inlined (text-like kinds).
    Inline(String),
    /// A stable URL the artifact can be downloaded from.
    Reference(String),
}

/// A job-session event, announced at most once per fact.
#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    /// The backend reported a new non-terminal status for a tracked job.
    StatusChanged {
        key: String,
        job_id: JobId,
        status: JobStatus,
    },

    /// An output became available and has not been announced before.
    ///
    /// The reconciler guarantees exactly one of these per (job, kind),
    /// surfaced in canonical kind order within a discovery pass.
    OutputAvailable {
        key: String,
        job_id: JobId,
        kind: OutputKind,
        payload: OutputPayload,
        timestamp: DateTime<Utc>,
    },

    /// The job reached `completed` and all known outputs were announced.
    JobCompleted { key: String, job_id: JobId },

    /// The job reached `failed`. Emitted exactly once; no partial-output
    /// flush precedes it.
    JobFailed {
        key: String,
        job_id: JobId,
        error: String,
    },

    /// The session was removed from the registry. This is the refresh
    /// signal consumed by results-projection holders.
    SessionFinished { key: String },
}

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`JobEvent`].
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
