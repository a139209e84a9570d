//! REST implementation of the conversion-backend endpoints.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use sopflow_core::projection::Catalog;
use sopflow_core::{JobStatus, OutputKind, Timestamp};

use crate::backend::{JobBackend, JobOutputs};
use crate::error::ApiError;

/// HTTP client for a single conversion-backend deployment.
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by `POST /upload` after a job was started for a
/// freshly uploaded document.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the new job.
    pub job_id: String,
}

/// Response returned by `POST /process_existing`.
#[derive(Debug, Deserialize)]
pub struct ExistingResponse {
    pub job_id: String,
    /// `true` means the backend found a complete output set and the job is
    /// already terminal; no polling is needed.
    pub reused: bool,
}

/// One entry of `GET /reprocessable_files`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReprocessableFile {
    pub key: String,
    pub has_all_outputs: bool,
    pub outputs_count: usize,
    pub missing_outputs: Vec<OutputKind>,
}

/// Response returned by the reprocess endpoints.
#[derive(Debug, Deserialize)]
pub struct ReprocessResponse {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
struct OutputsResponse {
    #[serde(default)]
    outputs: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ResultsStructureResponse {
    #[serde(default)]
    results: HashMap<String, Vec<String>>,
    #[serde(default)]
    input_files: Vec<String>,
    #[serde(default)]
    timestamps: HashMap<String, Timestamp>,
    #[serde(default)]
    input_timestamps: HashMap<String, Timestamp>,
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    input_key: String,
    job_id: String,
}

impl HttpBackend {
    /// Create a new client for a backend deployment.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base HTTP API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload a fresh document and start a conversion job for it.
    ///
    /// Sends a multipart `POST /upload` with the file contents.
    pub async fn submit(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<SubmitResponse, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Start (or reuse) a job for a previously uploaded document.
    ///
    /// `reused: true` in the response means a complete output set already
    /// exists and the returned job is terminal.
    pub async fn submit_existing(&self, input_key: &str) -> Result<ExistingResponse, ApiError> {
        let body = serde_json::json!({ "input_key": input_key });

        let response = self
            .client
            .post(format!("{}/process_existing", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the input/output catalog (`GET /results_structure`).
    ///
    /// The backend reports outputs as stored file names; they are mapped to
    /// [`OutputKind`]s here, skipping files that do not correspond to one.
    pub async fn catalog(&self) -> Result<Catalog, ApiError> {
        let response = self
            .client
            .get(format!("{}/results_structure", self.api_url))
            .send()
            .await?;

        let raw: ResultsStructureResponse = Self::parse_response(response).await?;
        Ok(catalog_from_wire(raw))
    }

    /// List inputs eligible for reprocessing, with their output gaps.
    pub async fn reprocessable_files(&self) -> Result<Vec<ReprocessableFile>, ApiError> {
        let response = self
            .client
            .get(format!("{}/reprocessable_files", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Reprocess a single existing input.
    pub async fn reprocess(&self, input_key: &str) -> Result<ReprocessResponse, ApiError> {
        let body = serde_json::json!({ "input_key": input_key });

        let response = self
            .client
            .post(format!("{}/reprocess", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Reprocess a batch of existing inputs; one job per input key.
    pub async fn reprocess_batch(
        &self,
        input_keys: &[String],
    ) -> Result<Vec<(String, String)>, ApiError> {
        let body = serde_json::json!({ "input_keys": input_keys });

        let response = self
            .client
            .post(format!("{}/reprocess_batch", self.api_url))
            .json(&body)
            .send()
            .await?;

        let entries: Vec<BatchEntry> = Self::parse_response(response).await?;
        Ok(entries
            .into_iter()
            .map(|e| (e.input_key, e.job_id))
            .collect())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success. 401/403 map to [`ApiError::AuthExpired`];
    /// other non-2xx codes carry the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ApiError::AuthExpired);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobBackend for HttpBackend {
    async fn status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        let response = self
            .client
            .get(format!("{}/status/{}", self.api_url, job_id))
            .send()
            .await?;

        let parsed: StatusResponse = Self::parse_response(response).await?;
        Ok(parsed.status)
    }

    async fn outputs_of(&self, job_id: &str) -> Result<JobOutputs, ApiError> {
        let response = self
            .client
            .get(format!("{}/job_outputs/{}", self.api_url, job_id))
            .send()
            .await?;

        let parsed: OutputsResponse = Self::parse_response(response).await?;
        Ok(outputs_from_wire(job_id, parsed))
    }

    async fn fetch_artifact(&self, job_id: &str, kind: OutputKind) -> Result<String, ApiError> {
        let response = self
            .client
            .get(self.artifact_url(job_id, kind))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.text().await?)
    }

    fn artifact_url(&self, job_id: &str, kind: OutputKind) -> String {
        match kind {
            // The final result has its own top-level download route.
            OutputKind::DownloadableResult => format!("{}/download/{}", self.api_url, job_id),
            other => format!("{}/download/{}/{}", self.api_url, job_id, other.backend_key()),
        }
    }
}

/// Map the wire output map (kind key, possibly `_path`-suffixed, → storage
/// path) into typed [`JobOutputs`]. Unknown keys are skipped with a warning
/// so a newer backend does not break older clients.
fn outputs_from_wire(job_id: &str, wire: OutputsResponse) -> JobOutputs {
    let mut outputs = JobOutputs::default();
    for (key, path) in wire.outputs {
        match OutputKind::from_backend_key(&key) {
            Ok(kind) => {
                outputs.paths.insert(kind, path);
            }
            Err(_) => {
                tracing::warn!(job_id, key = %key, "Skipping unknown output kind");
            }
        }
    }
    outputs
}

/// Convert `GET /results_structure` into the [`Catalog`] read model,
/// preserving the backend's input order.
fn catalog_from_wire(wire: ResultsStructureResponse) -> Catalog {
    let outputs_by_input = wire
        .results
        .into_iter()
        .map(|(input, files)| {
            let kinds: Vec<OutputKind> = OutputKind::ALL
                .into_iter()
                .filter(|k| files.iter().any(|f| f == k.artifact_filename()))
                .collect();
            (input, kinds)
        })
        .collect();

    Catalog {
        input_files: wire.input_files,
        outputs_by_input,
        timestamps: wire.timestamps,
        input_timestamps: wire.input_timestamps,
    }
}
