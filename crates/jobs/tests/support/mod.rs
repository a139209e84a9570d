//! Scripted in-memory backend for exercising pollers, sessions, and the
//! registry without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sopflow_client::{ApiError, JobBackend, JobOutputs};
use sopflow_core::{JobStatus, OutputKind};

/// One scripted response of the status endpoint.
#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    Status(JobStatus),
    /// A transient failure (server-side 5xx).
    Transient,
    /// Authentication rejection.
    AuthExpired,
}

/// Scripted [`JobBackend`]: per-job queues of responses where the last
/// entry repeats forever, plus call counters for assertions.
#[derive(Default)]
pub struct MockBackend {
    statuses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    outputs: Mutex<HashMap<String, VecDeque<Vec<OutputKind>>>>,
    artifacts: Mutex<HashMap<(String, OutputKind), String>>,
    fail_artifact_once: Mutex<Vec<(String, OutputKind)>>,
    fail_outputs_once: Mutex<Vec<String>>,
    cancel_on_status: Mutex<Option<CancellationToken>>,
    status_calls: Mutex<HashMap<String, usize>>,
    outputs_calls: Mutex<HashMap<String, usize>>,
    artifact_calls: Mutex<HashMap<(String, OutputKind), usize>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status sequence for a job. The final entry repeats on
    /// every later fetch.
    pub fn script_statuses(&self, job_id: &str, sequence: Vec<Scripted>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), sequence.into());
    }

    /// Script the output sets returned by successive discovery fetches.
    /// The final set repeats on every later fetch.
    pub fn script_outputs(&self, job_id: &str, sequence: Vec<Vec<OutputKind>>) {
        self.outputs
            .lock()
            .unwrap()
            .insert(job_id.to_string(), sequence.into());
    }

    /// Set the artifact body returned for one (job, kind).
    pub fn set_artifact(&self, job_id: &str, kind: OutputKind, body: &str) {
        self.artifacts
            .lock()
            .unwrap()
            .insert((job_id.to_string(), kind), body.to_string());
    }

    /// Make the next artifact fetch for (job, kind) fail transiently.
    pub fn fail_artifact_once(&self, job_id: &str, kind: OutputKind) {
        self.fail_artifact_once
            .lock()
            .unwrap()
            .push((job_id.to_string(), kind));
    }

    /// Make the next output-discovery fetch for a job fail transiently.
    pub fn fail_outputs_once(&self, job_id: &str) {
        self.fail_outputs_once
            .lock()
            .unwrap()
            .push(job_id.to_string());
    }

    /// Cancel `token` from inside the next status fetch, after the fetch
    /// has started. Models a cancellation racing an in-flight fetch.
    pub fn cancel_on_next_status(&self, token: CancellationToken) {
        *self.cancel_on_status.lock().unwrap() = Some(token);
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        *self.status_calls.lock().unwrap().get(job_id).unwrap_or(&0)
    }

    pub fn outputs_calls(&self, job_id: &str) -> usize {
        *self.outputs_calls.lock().unwrap().get(job_id).unwrap_or(&0)
    }

    pub fn artifact_calls(&self, job_id: &str, kind: OutputKind) -> usize {
        *self
            .artifact_calls
            .lock()
            .unwrap()
            .get(&(job_id.to_string(), kind))
            .unwrap_or(&0)
    }

    fn transient() -> ApiError {
        ApiError::Api {
            status: 503,
            body: "scripted transient failure".to_string(),
        }
    }

    fn pop_repeating_last<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl JobBackend for MockBackend {
    async fn status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_insert(0) += 1;

        if let Some(token) = self.cancel_on_status.lock().unwrap().take() {
            token.cancel();
        }

        let scripted = {
            let mut statuses = self.statuses.lock().unwrap();
            statuses
                .get_mut(job_id)
                .and_then(Self::pop_repeating_last)
        };

        match scripted {
            Some(Scripted::Status(status)) => Ok(status),
            Some(Scripted::Transient) => Err(Self::transient()),
            Some(Scripted::AuthExpired) => Err(ApiError::AuthExpired),
            None => Err(ApiError::Api {
                status: 404,
                body: format!("no script for job '{job_id}'"),
            }),
        }
    }

    async fn outputs_of(&self, job_id: &str) -> Result<JobOutputs, ApiError> {
        *self
            .outputs_calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_insert(0) += 1;

        {
            let mut failures = self.fail_outputs_once.lock().unwrap();
            if let Some(pos) = failures.iter().position(|j| j == job_id) {
                failures.remove(pos);
                return Err(Self::transient());
            }
        }

        let kinds = {
            let mut outputs = self.outputs.lock().unwrap();
            outputs
                .get_mut(job_id)
                .and_then(Self::pop_repeating_last)
                .unwrap_or_default()
        };

        let mut result = JobOutputs::default();
        for kind in kinds {
            result
                .paths
                .insert(kind, format!("/results/{job_id}/{}", kind.artifact_filename()));
        }
        Ok(result)
    }

    async fn fetch_artifact(&self, job_id: &str, kind: OutputKind) -> Result<String, ApiError> {
        *self
            .artifact_calls
            .lock()
            .unwrap()
            .entry((job_id.to_string(), kind))
            .or_insert(0) += 1;

        {
            let mut failures = self.fail_artifact_once.lock().unwrap();
            if let Some(pos) = failures
                .iter()
                .position(|(j, k)| j == job_id && *k == kind)
            {
                failures.remove(pos);
                return Err(Self::transient());
            }
        }

        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .get(&(job_id.to_string(), kind))
            .cloned()
            .unwrap_or_else(|| format!("{kind} body for {job_id}")))
    }

    fn artifact_url(&self, job_id: &str, kind: OutputKind) -> String {
        match kind {
            OutputKind::DownloadableResult => format!("http://test/download/{job_id}"),
            other => format!("http://test/download/{job_id}/{}", other.backend_key()),
        }
    }
}

/// Poll `condition` until it holds or the deadline passes.
pub async fn wait_until<F, Fut>(mut condition: F, deadline: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}
