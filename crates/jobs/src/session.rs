//! One backend job's lifecycle, from submission to terminal state.
//!
//! A [`JobSession`] owns exactly one job id. It drives the
//! [`JobPoller`](crate::poller::JobPoller) to a terminal status, runs an
//! output-discovery pass on every `processing` tick (the backend serves
//! partial outputs while later pipeline stages are still running) and a
//! final one on `completed`, and announces each newly available output on
//! the event bus exactly once via the reconciler.
//!
//! On `failed` a single failure announcement is emitted; no partial-output
//! flush is attempted.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use sopflow_client::{ApiError, JobBackend};
use sopflow_core::{JobId, JobStatus, OutputKind, RenderStrategy};
use sopflow_events::{EventBus, JobEvent, OutputPayload};

use crate::poller::JobPoller;
use crate::reconciler::reconcile_delta;

/// How many times the terminal discovery pass is retried (at the polling
/// cadence) before completion is announced without it. Mid-run passes get
/// retried for free on the next tick; the terminal pass has no next tick.
const FINAL_DISCOVERY_ATTEMPTS: usize = 5;

/// Tracks one backend job and announces its outputs.
pub struct JobSession {
    key: String,
    job_id: JobId,
    backend: Arc<dyn JobBackend>,
    bus: Arc<EventBus>,
    /// Outputs already surfaced. Grows monotonically, never re-announces.
    announced: HashSet<OutputKind>,
    last_status: Option<JobStatus>,
}

impl JobSession {
    /// Create a session for a job tracked under `key` (the input key for
    /// reprocessing, or the job id itself for fresh uploads).
    pub fn new(
        key: impl Into<String>,
        job_id: impl Into<JobId>,
        backend: Arc<dyn JobBackend>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            key: key.into(),
            job_id: job_id.into(),
            backend,
            bus,
            announced: HashSet::new(),
            last_status: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Drive the session to a terminal state.
    ///
    /// Returns the terminal status, or `Ok(None)` when cancelled first.
    /// Only an authentication failure propagates as an error; transient
    /// fetch problems are absorbed by the polling cadence.
    pub async fn run(
        mut self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Result<Option<JobStatus>, ApiError> {
        // The poller borrows clones so the session stays free for the
        // discovery passes between ticks.
        let backend = Arc::clone(&self.backend);
        let job_id = self.job_id.clone();
        let mut poller = JobPoller::new(backend.as_ref(), &job_id, interval, cancel);

        while let Some(status) = poller.next().await? {
            self.observe_status(status);

            match status {
                JobStatus::Queued => {}
                JobStatus::Processing => {
                    // Reveal intermediate artifacts as they appear. A
                    // transient discovery failure waits for the next tick.
                    if let Err(e) = self.discover_and_announce().await {
                        if matches!(e, ApiError::AuthExpired) {
                            return Err(e);
                        }
                        tracing::debug!(
                            job_id = %self.job_id,
                            error = %e,
                            "Output discovery failed, deferring to next tick",
                        );
                    }
                }
                JobStatus::Completed => {
                    return self.finish_completed(interval).await.map(Some);
                }
                JobStatus::Failed => {
                    self.finish_failed();
                    return Ok(Some(JobStatus::Failed));
                }
            }
        }

        tracing::debug!(key = %self.key, job_id = %self.job_id, "Session cancelled");
        Ok(None)
    }

    /// Complete a session whose job is already terminal (the backend
    /// reused an existing output set, `reused: true`). No polling happens;
    /// the discovery/announcement pass runs immediately.
    pub async fn run_already_completed(
        mut self,
        interval: Duration,
    ) -> Result<JobStatus, ApiError> {
        tracing::info!(key = %self.key, job_id = %self.job_id, "Reusing completed job");
        self.finish_completed(interval).await
    }

    // ---- private helpers ----

    /// Publish a status-change event for non-terminal transitions.
    fn observe_status(&mut self, status: JobStatus) {
        if self.last_status == Some(status) {
            return;
        }
        self.last_status = Some(status);

        if !status.is_terminal() {
            self.bus.publish(JobEvent::StatusChanged {
                key: self.key.clone(),
                job_id: self.job_id.clone(),
                status,
            });
        }
    }

    /// Final discovery pass, completion announcement, terminal return.
    ///
    /// This pass is the last chance to announce anything: transient
    /// failures are retried at the polling cadence before completion is
    /// claimed, so an available output is not silently lost to one 5xx.
    async fn finish_completed(&mut self, interval: Duration) -> Result<JobStatus, ApiError> {
        for attempt in 1..=FINAL_DISCOVERY_ATTEMPTS {
            match self.discover_and_announce().await {
                Ok(()) => break,
                Err(ApiError::AuthExpired) => return Err(ApiError::AuthExpired),
                Err(e) if attempt < FINAL_DISCOVERY_ATTEMPTS => {
                    tracing::debug!(
                        job_id = %self.job_id,
                        error = %e,
                        attempt,
                        "Final output discovery failed, retrying",
                    );
                    tokio::time::sleep(interval).await;
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %self.job_id,
                        error = %e,
                        "Final output discovery abandoned",
                    );
                }
            }
        }

        tracing::info!(key = %self.key, job_id = %self.job_id, "Job completed");
        self.bus.publish(JobEvent::JobCompleted {
            key: self.key.clone(),
            job_id: self.job_id.clone(),
        });
        Ok(JobStatus::Completed)
    }

    /// Exactly one failure announcement; no partial-output flush.
    fn finish_failed(&mut self) {
        tracing::warn!(key = %self.key, job_id = %self.job_id, "Job failed");
        self.bus.publish(JobEvent::JobFailed {
            key: self.key.clone(),
            job_id: self.job_id.clone(),
            error: "backend reported terminal failure".to_string(),
        });
    }

    /// One reconciliation pass: fetch the current output set and announce
    /// whatever is available but not yet announced, in canonical order.
    ///
    /// A kind is marked announced only after its announcement succeeded;
    /// a failed inline fetch leaves it for the next pass. A failed output
    /// fetch is the caller's to handle (defer or retry).
    async fn discover_and_announce(&mut self) -> Result<(), ApiError> {
        let outputs = self.backend.outputs_of(&self.job_id).await?;

        for kind in reconcile_delta(&outputs.available_kinds(), &self.announced) {
            let payload = match kind.render_strategy() {
                RenderStrategy::InlineText => {
                    match self.backend.fetch_artifact(&self.job_id, kind).await {
                        Ok(text) => OutputPayload::Inline(text),
                        Err(ApiError::AuthExpired) => return Err(ApiError::AuthExpired),
                        Err(e) => {
                            tracing::debug!(
                                job_id = %self.job_id,
                                kind = %kind,
                                error = %e,
                                "Artifact fetch failed, kind stays unannounced",
                            );
                            continue;
                        }
                    }
                }
                RenderStrategy::ReferenceLink => {
                    OutputPayload::Reference(self.backend.artifact_url(&self.job_id, kind))
                }
            };

            self.bus.publish(JobEvent::OutputAvailable {
                key: self.key.clone(),
                job_id: self.job_id.clone(),
                kind,
                payload,
                timestamp: Utc::now(),
            });
            self.announced.insert(kind);

            tracing::info!(key = %self.key, job_id = %self.job_id, kind = %kind, "Output announced");
        }

        Ok(())
    }
}
