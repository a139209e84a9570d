//! Job tracking for the conversion backend.
//!
//! One [`JobSession`] owns one backend job's lifecycle: the
//! [`poller`] drives its status to a terminal state at a fixed cadence,
//! the [`reconciler`] computes which newly available outputs still need
//! announcing, and the [`JobRegistry`] tracks all in-flight sessions
//! (single conversions, reprocessing, batch reprocessing) with at most one
//! polling loop per key.
//!
//! Every announcement is published on the shared
//! [`EventBus`](sopflow_events::EventBus) exactly once, in canonical
//! output-kind order.

pub mod poller;
pub mod reconciler;
pub mod registry;
pub mod session;

pub use poller::{JobPoller, POLL_INTERVAL};
pub use reconciler::reconcile_delta;
pub use registry::JobRegistry;
pub use session::JobSession;
