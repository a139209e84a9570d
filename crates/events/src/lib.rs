//! In-process job event bus.
//!
//! Job sessions publish their lifecycle and output announcements here;
//! the CLI (or any other front end) subscribes and decides how to present
//! them. Backed by `tokio::sync::broadcast` so any number of subscribers
//! independently receive every event.

pub mod bus;

pub use bus::{EventBus, JobEvent, OutputPayload};
