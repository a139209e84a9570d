//! The guarded viewer lifecycle.
//!
//! A [`ViewerSession`] owns its [`RenderEngine`] exclusively. The lifecycle
//! is `Absent → Importing → Ready → Disposing → Absent`; the engine handle
//! is only ever touched in a phase that allows it, and a disposal request
//! that races an in-flight import wins: the imported diagram is destroyed
//! without ever being exposed.

use tokio_util::sync::CancellationToken;

use sopflow_core::cleaning::extract_diagram_xml;

use crate::engine::{ContentBounds, RenderEngine};
use crate::error::ViewerError;
use crate::viewbox::{fit_view_box, zoom_view_box, ViewBox, Viewport, ZOOM_STEP};

/// Where the session is in its engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// No engine content; the session can be opened.
    Absent,
    /// An import is in flight; the handle must not be exposed.
    Importing,
    /// Imported and interactive.
    Ready,
    /// Teardown has begun; the handle must not be touched.
    Disposing,
}

/// User-facing view operations, all gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCommand {
    ZoomIn,
    ZoomOut,
    /// Fit the whole diagram into the viewport.
    FitViewport,
    /// Back to 1:1 scale, centered on the diagram.
    ResetView,
}

/// How an [`open`](ViewerSession::open) call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    /// A disposal request raced the import; nothing was exposed.
    Discarded,
}

pub struct ViewerSession<E: RenderEngine> {
    engine: E,
    phase: LifecyclePhase,
    viewport: Viewport,
    /// Viewport to restore when leaving fullscreen.
    windowed_viewport: Viewport,
    fullscreen: bool,
    /// Set while a fullscreen enter/exit is animating; the gate blocks
    /// commands until [`transition_complete`](Self::transition_complete).
    transition_in_flight: bool,
    /// Disposal request for this session's current content. Checked
    /// immediately before and immediately after the import await.
    dispose: CancellationToken,
    bounds: Option<ContentBounds>,
    view: Option<ViewBox>,
}

impl<E: RenderEngine> ViewerSession<E> {
    pub fn new(engine: E, viewport: Viewport) -> Self {
        Self {
            engine,
            phase: LifecyclePhase::Absent,
            viewport,
            windowed_viewport: viewport,
            fullscreen: false,
            transition_in_flight: false,
            dispose: CancellationToken::new(),
            bounds: None,
            view: None,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// The camera's current view box, when the session is ready.
    pub fn current_view(&self) -> Option<ViewBox> {
        self.view
    }

    /// A handle that requests disposal of the content currently being
    /// opened or shown. Cancelling it mid-import discards the import.
    pub fn dispose_handle(&self) -> CancellationToken {
        self.dispose.clone()
    }

    /// Import diagram content and bring the session to `Ready`.
    ///
    /// On an engine import error the content is cleaned once
    /// (narrative wrappers stripped) and retried; a second failure is
    /// surfaced as [`ViewerError::Import`]. A disposal request observed
    /// before or after the import await discards the content without
    /// exposing it and leaves the session `Absent`.
    pub async fn open(&mut self, content: &str) -> Result<OpenOutcome, ViewerError> {
        if self.phase != LifecyclePhase::Absent {
            self.close();
        }
        self.phase = LifecyclePhase::Importing;

        if self.dispose.is_cancelled() {
            tracing::debug!("Disposal requested before import, discarding");
            self.reset_to_absent();
            return Ok(OpenOutcome::Discarded);
        }

        let bounds = match self.engine.import(content).await {
            Ok(bounds) => bounds,
            Err(first) => {
                let cleaned = extract_diagram_xml(content);
                if cleaned == content {
                    self.reset_to_absent();
                    return Err(ViewerError::Import(first));
                }
                tracing::debug!(error = %first, "Import failed, retrying with cleaned content");
                match self.engine.import(cleaned).await {
                    Ok(bounds) => bounds,
                    Err(second) => {
                        self.reset_to_absent();
                        return Err(ViewerError::Import(second));
                    }
                }
            }
        };

        // The import awaited; a disposal request may have arrived meanwhile.
        if self.dispose.is_cancelled() {
            tracing::debug!("Disposal requested during import, discarding");
            self.phase = LifecyclePhase::Disposing;
            self.engine.destroy();
            self.reset_to_absent();
            return Ok(OpenOutcome::Discarded);
        }

        let view = fit_view_box(self.viewport, bounds);
        self.engine.apply_view(view);
        self.bounds = Some(bounds);
        self.view = Some(view);
        self.phase = LifecyclePhase::Ready;

        Ok(OpenOutcome::Opened)
    }

    /// Execute a view command, if the gate allows it.
    ///
    /// Anything other than a ready, transition-free session makes this a
    /// silent no-op: never an error, never a touch of the engine handle.
    pub fn command(&mut self, op: ViewCommand) {
        if self.phase != LifecyclePhase::Ready
            || self.transition_in_flight
            || self.dispose.is_cancelled()
        {
            tracing::trace!(?op, phase = ?self.phase, "View command blocked by gate");
            return;
        }

        let (Some(view), Some(bounds)) = (self.view, self.bounds) else {
            return;
        };

        let next = match op {
            ViewCommand::ZoomIn => zoom_view_box(view, ZOOM_STEP),
            ViewCommand::ZoomOut => zoom_view_box(view, 1.0 / ZOOM_STEP),
            ViewCommand::FitViewport => fit_view_box(self.viewport, bounds),
            ViewCommand::ResetView => ViewBox {
                x: bounds.x + (bounds.width - self.viewport.width) / 2.0,
                y: bounds.y + (bounds.height - self.viewport.height) / 2.0,
                width: self.viewport.width,
                height: self.viewport.height,
            },
        };

        self.engine.apply_view(next);
        self.view = Some(next);
    }

    /// Enter or leave fullscreen without disposing the diagram: the camera
    /// is refit to the new viewport and commands stay blocked until the
    /// transition completes.
    pub fn set_fullscreen(&mut self, on: bool, viewport: Viewport) {
        if self.phase != LifecyclePhase::Ready || on == self.fullscreen {
            return;
        }

        if on {
            self.windowed_viewport = self.viewport;
        }
        self.fullscreen = on;
        self.viewport = viewport;
        self.transition_in_flight = true;

        if let Some(bounds) = self.bounds {
            let view = fit_view_box(self.viewport, bounds);
            self.engine.apply_view(view);
            self.view = Some(view);
        }
    }

    /// Signal that the fullscreen enter/exit animation has finished,
    /// unblocking the command gate.
    pub fn transition_complete(&mut self) {
        self.transition_in_flight = false;
    }

    /// The escape key: leaving fullscreen takes priority over closing.
    /// A fullscreen session only drops back to windowed mode; a windowed
    /// one is closed.
    pub fn escape(&mut self) {
        if self.fullscreen {
            let windowed = self.windowed_viewport;
            self.set_fullscreen(false, windowed);
        } else {
            self.close();
        }
    }

    /// Destroy the engine content and return to `Absent`. Idempotent; the
    /// handle is never touched once destruction begins.
    pub fn close(&mut self) {
        if self.phase == LifecyclePhase::Absent {
            return;
        }
        self.phase = LifecyclePhase::Disposing;
        self.engine.destroy();
        self.reset_to_absent();
    }

    fn reset_to_absent(&mut self) {
        self.phase = LifecyclePhase::Absent;
        self.bounds = None;
        self.view = None;
        self.fullscreen = false;
        self.transition_in_flight = false;
        // A spent disposal request must not leak into the next open.
        self.dispose = CancellationToken::new();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;

    const WINDOWED: Viewport = Viewport {
        width: 800.0,
        height: 600.0,
    };
    const FULL: Viewport = Viewport {
        width: 1920.0,
        height: 1080.0,
    };
    const BOUNDS: ContentBounds = ContentBounds {
        x: 0.0,
        y: 0.0,
        width: 400.0,
        height: 300.0,
    };

    const WRAPPED: &str = "Certainly! Here is the diagram:\n\
        <?xml version=\"1.0\"?>\n<bpmn:definitions></bpmn:definitions>\ntrailing prose";
    const PLAIN: &str = "not a diagram at all";

    #[derive(Default)]
    struct Recorded {
        imports: Vec<String>,
        applied: Vec<ViewBox>,
        destroys: usize,
    }

    struct ScriptedEngine {
        recorded: Arc<Mutex<Recorded>>,
        fail_imports: usize,
        cancel_on_import: Option<CancellationToken>,
    }

    impl ScriptedEngine {
        fn new() -> (Self, Arc<Mutex<Recorded>>) {
            let recorded = Arc::new(Mutex::new(Recorded::default()));
            (
                Self {
                    recorded: Arc::clone(&recorded),
                    fail_imports: 0,
                    cancel_on_import: None,
                },
                recorded,
            )
        }
    }

    #[async_trait]
    impl RenderEngine for ScriptedEngine {
        async fn import(&mut self, xml: &str) -> Result<ContentBounds, String> {
            self.recorded.lock().unwrap().imports.push(xml.to_string());
            if let Some(token) = self.cancel_on_import.take() {
                token.cancel();
            }
            if self.fail_imports > 0 {
                self.fail_imports -= 1;
                return Err("scripted import failure".to_string());
            }
            Ok(BOUNDS)
        }

        fn apply_view(&mut self, view: ViewBox) {
            self.recorded.lock().unwrap().applied.push(view);
        }

        fn destroy(&mut self) {
            self.recorded.lock().unwrap().destroys += 1;
        }
    }

    #[tokio::test]
    async fn open_imports_and_fits_the_camera() {
        let (engine, recorded) = ScriptedEngine::new();
        let mut session = ViewerSession::new(engine, WINDOWED);

        let outcome = session.open(WRAPPED).await.unwrap();

        assert_eq!(outcome, OpenOutcome::Opened);
        assert_eq!(session.phase(), LifecyclePhase::Ready);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.imports.len(), 1);
        assert_eq!(recorded.applied, vec![fit_view_box(WINDOWED, BOUNDS)]);
    }

    #[tokio::test]
    async fn import_error_retries_once_with_cleaned_content() {
        let (mut engine, recorded) = ScriptedEngine::new();
        engine.fail_imports = 1;
        let mut session = ViewerSession::new(engine, WINDOWED);

        let outcome = session.open(WRAPPED).await.unwrap();
        assert_eq!(outcome, OpenOutcome::Opened);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.imports.len(), 2);
        assert_eq!(recorded.imports[0], WRAPPED);
        assert!(recorded.imports[1].starts_with("<?xml"));
        assert!(recorded.imports[1].ends_with("</bpmn:definitions>"));
    }

    #[tokio::test]
    async fn uncleanable_content_fails_without_a_retry() {
        let (mut engine, recorded) = ScriptedEngine::new();
        engine.fail_imports = 1;
        let mut session = ViewerSession::new(engine, WINDOWED);

        assert_matches!(session.open(PLAIN).await, Err(ViewerError::Import(_)));
        assert_eq!(session.phase(), LifecyclePhase::Absent);
        assert_eq!(recorded.lock().unwrap().imports.len(), 1);
    }

    #[tokio::test]
    async fn second_import_failure_is_surfaced() {
        let (mut engine, recorded) = ScriptedEngine::new();
        engine.fail_imports = 2;
        let mut session = ViewerSession::new(engine, WINDOWED);

        assert_matches!(session.open(WRAPPED).await, Err(ViewerError::Import(_)));
        assert_eq!(session.phase(), LifecyclePhase::Absent);
        assert_eq!(recorded.lock().unwrap().imports.len(), 2);
    }

    #[tokio::test]
    async fn dispose_before_import_never_touches_the_engine() {
        let (engine, recorded) = ScriptedEngine::new();
        let mut session = ViewerSession::new(engine, WINDOWED);

        session.dispose_handle().cancel();
        let outcome = session.open(WRAPPED).await.unwrap();

        assert_eq!(outcome, OpenOutcome::Discarded);
        assert_eq!(session.phase(), LifecyclePhase::Absent);

        let recorded = recorded.lock().unwrap();
        assert!(recorded.imports.is_empty());
        assert_eq!(recorded.destroys, 0);
    }

    #[tokio::test]
    async fn dispose_during_import_destroys_without_exposing() {
        let (engine, recorded) = ScriptedEngine::new();
        let mut session = ViewerSession::new(engine, WINDOWED);
        // The engine cancels this handle mid-import, simulating a disposal
        // request racing the import await.
        let handle = session.dispose_handle();
        session.engine.cancel_on_import = Some(handle);

        let outcome = session.open(WRAPPED).await.unwrap();

        assert_eq!(outcome, OpenOutcome::Discarded);
        assert_eq!(session.phase(), LifecyclePhase::Absent);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.imports.len(), 1);
        assert_eq!(recorded.destroys, 1);
        assert!(recorded.applied.is_empty());
    }

    #[tokio::test]
    async fn commands_are_gated_until_ready() {
        let (engine, recorded) = ScriptedEngine::new();
        let mut session = ViewerSession::new(engine, WINDOWED);

        session.command(ViewCommand::ZoomIn);
        assert!(recorded.lock().unwrap().applied.is_empty());

        session.open(WRAPPED).await.unwrap();
        session.command(ViewCommand::ZoomIn);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.applied.len(), 2);
        assert_eq!(
            recorded.applied[1],
            zoom_view_box(fit_view_box(WINDOWED, BOUNDS), ZOOM_STEP)
        );
    }

    #[tokio::test]
    async fn fit_viewport_restores_the_fitted_view() {
        let (engine, _) = ScriptedEngine::new();
        let mut session = ViewerSession::new(engine, WINDOWED);
        session.open(WRAPPED).await.unwrap();

        session.command(ViewCommand::ZoomIn);
        session.command(ViewCommand::FitViewport);

        assert_eq!(session.current_view(), Some(fit_view_box(WINDOWED, BOUNDS)));
    }

    #[tokio::test]
    async fn fullscreen_refits_without_disposing_and_blocks_commands() {
        let (engine, recorded) = ScriptedEngine::new();
        let mut session = ViewerSession::new(engine, WINDOWED);
        session.open(WRAPPED).await.unwrap();

        session.set_fullscreen(true, FULL);
        assert!(session.is_fullscreen());
        assert_eq!(session.phase(), LifecyclePhase::Ready);
        assert_eq!(recorded.lock().unwrap().destroys, 0);
        assert_eq!(session.current_view(), Some(fit_view_box(FULL, BOUNDS)));

        // Blocked while the transition is animating.
        let applied_before = recorded.lock().unwrap().applied.len();
        session.command(ViewCommand::ZoomIn);
        assert_eq!(recorded.lock().unwrap().applied.len(), applied_before);

        session.transition_complete();
        session.command(ViewCommand::ZoomIn);
        assert_eq!(recorded.lock().unwrap().applied.len(), applied_before + 1);
    }

    #[tokio::test]
    async fn escape_leaves_fullscreen_before_closing() {
        let (engine, recorded) = ScriptedEngine::new();
        let mut session = ViewerSession::new(engine, WINDOWED);
        session.open(WRAPPED).await.unwrap();
        session.set_fullscreen(true, FULL);
        session.transition_complete();

        session.escape();
        assert!(!session.is_fullscreen());
        assert_eq!(session.phase(), LifecyclePhase::Ready);
        assert_eq!(session.current_view(), Some(fit_view_box(WINDOWED, BOUNDS)));
        assert_eq!(recorded.lock().unwrap().destroys, 0);

        session.escape();
        assert_eq!(session.phase(), LifecyclePhase::Absent);
        assert_eq!(recorded.lock().unwrap().destroys, 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (engine, recorded) = ScriptedEngine::new();
        let mut session = ViewerSession::new(engine, WINDOWED);
        session.open(WRAPPED).await.unwrap();

        session.close();
        session.close();

        assert_eq!(session.phase(), LifecyclePhase::Absent);
        assert_eq!(recorded.lock().unwrap().destroys, 1);
    }
}
