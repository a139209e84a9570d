//! Shared types for the sopflow conversion client.
//!
//! Everything in this crate is pure: no network, no async, no mutable
//! globals. The other crates build the job-tracking and viewer machinery
//! on top of these definitions.

pub mod cleaning;
pub mod error;
pub mod output_kind;
pub mod projection;
pub mod status;
pub mod types;

pub use error::CoreError;
pub use output_kind::{OutputKind, RenderStrategy};
pub use status::JobStatus;
pub use types::{JobId, Timestamp};
