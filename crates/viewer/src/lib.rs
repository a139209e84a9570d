//! Interactive diagram viewer session.
//!
//! Wraps a rendering engine behind a guarded lifecycle: a session owns its
//! engine handle exclusively, view commands pass through a safe-operation
//! gate, and disposal requests raced against an in-flight import are
//! honoured without ever exposing a half-imported diagram.

mod engine;
mod error;
mod session;
mod viewbox;

pub use engine::{ContentBounds, RenderEngine};
pub use error::ViewerError;
pub use session::{LifecyclePhase, OpenOutcome, ViewCommand, ViewerSession};
pub use viewbox::{fit_view_box, zoom_view_box, ViewBox, Viewport, ZOOM_STEP};
