//! HTTP client for the SOP→BPMN conversion backend.
//!
//! [`HttpBackend`] wraps the backend's REST endpoints (upload, reprocess,
//! status polling, output discovery, artifact download, catalog) using
//! [`reqwest`]. The subset of operations the job-tracking machinery needs
//! is abstracted behind the [`JobBackend`] trait so sessions can be tested
//! against a scripted backend.

pub mod backend;
pub mod error;
pub mod http;

pub use backend::{JobBackend, JobOutputs};
pub use error::ApiError;
pub use http::{
    ExistingResponse, HttpBackend, ReprocessResponse, ReprocessableFile, SubmitResponse,
};
