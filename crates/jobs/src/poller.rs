//! The polling primitive.
//!
//! [`JobPoller`] repeatedly queries one job's status at a fixed period
//! until a terminal state is observed, then stops itself permanently.
//! Nothing above this module re-implements polling: sessions compose on
//! top of [`JobPoller::next`], which also keeps ticks strictly sequential
//! (a tick never starts before the caller has consumed the previous one).

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sopflow_client::{ApiError, JobBackend};
use sopflow_core::JobStatus;

/// Fixed cadence between status fetches.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Cancellable fixed-period status poller for one job id.
///
/// Cancellation is observed at every suspension point; a fetch already in
/// flight when the token fires has its result discarded on arrival.
pub struct JobPoller<'a> {
    backend: &'a dyn JobBackend,
    job_id: &'a str,
    interval: Duration,
    cancel: CancellationToken,
    /// Set once a terminal status has been returned; later calls yield `None`.
    finished: bool,
    /// The first tick fetches immediately; later ticks wait out the interval.
    first_tick: bool,
}

impl<'a> JobPoller<'a> {
    pub fn new(
        backend: &'a dyn JobBackend,
        job_id: &'a str,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            job_id,
            interval,
            cancel,
            finished: false,
            first_tick: true,
        }
    }

    /// Wait for the next successfully observed status.
    ///
    /// Returns `Ok(None)` when the poller was cancelled or has already
    /// delivered a terminal status. Transient fetch errors are treated as
    /// "no update this tick": logged, skipped, and the cadence continues —
    /// the loop is bounded only by a terminal status arriving. An
    /// authentication failure is the one error that propagates.
    pub async fn next(&mut self) -> Result<Option<JobStatus>, ApiError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            if !self.first_tick {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(None),
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            self.first_tick = false;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                result = self.backend.status(self.job_id) => result,
            };

            // A cancellation that raced the fetch wins: discard the result.
            if self.cancel.is_cancelled() {
                return Ok(None);
            }

            match result {
                Ok(status) => {
                    if status.is_terminal() {
                        self.finished = true;
                    }
                    return Ok(Some(status));
                }
                Err(ApiError::AuthExpired) => return Err(ApiError::AuthExpired),
                Err(e) if e.is_transient() => {
                    tracing::debug!(
                        job_id = self.job_id,
                        error = %e,
                        "Transient status fetch error, skipping tick",
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = self.job_id,
                        error = %e,
                        "Status fetch rejected, skipping tick",
                    );
                }
            }
        }
    }

    /// Whether a terminal status has been delivered.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
