//! The backend seam the job-tracking machinery polls against.

use std::collections::BTreeMap;

use async_trait::async_trait;

use sopflow_core::{JobStatus, OutputKind};

use crate::error::ApiError;

/// Outputs known for one job at one point in time.
///
/// Monotonically non-decreasing on the backend side: once a kind has a
/// path it keeps it.
#[derive(Debug, Clone, Default)]
pub struct JobOutputs {
    /// Backend storage path per available kind. Absence means the kind has
    /// not been produced yet.
    pub paths: BTreeMap<OutputKind, String>,
}

impl JobOutputs {
    /// The kinds available right now.
    pub fn available_kinds(&self) -> Vec<OutputKind> {
        self.paths.keys().copied().collect()
    }
}

/// The operations a job session needs from the conversion backend.
///
/// [`HttpBackend`](crate::http::HttpBackend) is the production
/// implementation; tests substitute a scripted one.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Current status of a job.
    async fn status(&self, job_id: &str) -> Result<JobStatus, ApiError>;

    /// Outputs discovered for a job so far. Served for `processing` jobs
    /// too, so intermediate artifacts can be revealed while later pipeline
    /// stages are still running.
    async fn outputs_of(&self, job_id: &str) -> Result<JobOutputs, ApiError>;

    /// Fetch an artifact's body as text (used for inline-text kinds).
    async fn fetch_artifact(&self, job_id: &str, kind: OutputKind) -> Result<String, ApiError>;

    /// Stable download URL for an artifact (used for reference-link kinds).
    fn artifact_url(&self, job_id: &str, kind: OutputKind) -> String;
}
