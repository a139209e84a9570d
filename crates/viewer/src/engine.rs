//! The rendering-engine seam.
//!
//! The session never talks to a concrete renderer directly; it drives this
//! trait so tests (and alternative frontends) can substitute their own
//! implementation.

use async_trait::async_trait;

use crate::viewbox::ViewBox;

/// Bounding box of the imported diagram, in diagram coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A diagram renderer owned by exactly one [`ViewerSession`].
///
/// `import` parses and lays out the diagram; `apply_view` moves the camera;
/// `destroy` releases every renderer resource. After `destroy` the handle
/// must not be touched again.
///
/// [`ViewerSession`]: crate::ViewerSession
#[async_trait]
pub trait RenderEngine: Send {
    /// Parse and render the diagram, returning its content bounds.
    /// The error string is whatever diagnostic the renderer produced.
    async fn import(&mut self, xml: &str) -> Result<ContentBounds, String>;

    /// Move the camera to the given view box.
    fn apply_view(&mut self, view: ViewBox);

    /// Tear the renderer down. Called at most once per imported diagram.
    fn destroy(&mut self);
}
