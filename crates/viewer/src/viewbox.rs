//! Pure view-box math for the viewer camera.

use crate::engine::ContentBounds;

/// Relative zoom applied by one zoom-in step; zoom-out divides by it.
pub const ZOOM_STEP: f64 = 1.25;

/// The visible area of the host surface, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// The camera: which diagram-coordinate rectangle fills the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Fit the whole diagram into the viewport: uniform scale
/// `min(vw/cw, vh/ch)`, content centered along the slack axis.
///
/// Degenerate content (zero-sized bounds) yields a view box the size of the
/// viewport centered on the content origin, so the camera never divides by
/// zero.
pub fn fit_view_box(viewport: Viewport, bounds: ContentBounds) -> ViewBox {
    if bounds.width <= 0.0 || bounds.height <= 0.0 {
        return ViewBox {
            x: bounds.x - viewport.width / 2.0,
            y: bounds.y - viewport.height / 2.0,
            width: viewport.width,
            height: viewport.height,
        };
    }

    let scale = (viewport.width / bounds.width).min(viewport.height / bounds.height);
    let width = viewport.width / scale;
    let height = viewport.height / scale;

    ViewBox {
        x: bounds.x - (width - bounds.width) / 2.0,
        y: bounds.y - (height - bounds.height) / 2.0,
        width,
        height,
    }
}

/// Scale the view box by `factor` around its center. `factor > 1` zooms in
/// (the visible rectangle shrinks).
pub fn zoom_view_box(view: ViewBox, factor: f64) -> ViewBox {
    let (cx, cy) = view.center();
    let width = view.width / factor;
    let height = view.height / factor;

    ViewBox {
        x: cx - width / 2.0,
        y: cy - height / 2.0,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn fit_centers_wide_content_vertically() {
        // 200x100 content into a 100x100 viewport: scale 0.5, the view box
        // covers 200x200 in diagram coordinates with 50 slack above/below.
        let view = fit_view_box(
            Viewport {
                width: 100.0,
                height: 100.0,
            },
            ContentBounds {
                x: 0.0,
                y: 0.0,
                width: 200.0,
                height: 100.0,
            },
        );

        assert!(approx(view.width, 200.0));
        assert!(approx(view.height, 200.0));
        assert!(approx(view.x, 0.0));
        assert!(approx(view.y, -50.0));
    }

    #[test]
    fn fit_centers_tall_content_horizontally() {
        let view = fit_view_box(
            Viewport {
                width: 300.0,
                height: 150.0,
            },
            ContentBounds {
                x: 10.0,
                y: 20.0,
                width: 50.0,
                height: 150.0,
            },
        );

        // scale = min(300/50, 150/150) = 1.0
        assert!(approx(view.width, 300.0));
        assert!(approx(view.height, 150.0));
        assert!(approx(view.x, 10.0 - 125.0));
        assert!(approx(view.y, 20.0));
    }

    #[test]
    fn fit_respects_content_offset() {
        let view = fit_view_box(
            Viewport {
                width: 100.0,
                height: 100.0,
            },
            ContentBounds {
                x: 40.0,
                y: 60.0,
                width: 100.0,
                height: 100.0,
            },
        );

        assert_eq!(
            view,
            ViewBox {
                x: 40.0,
                y: 60.0,
                width: 100.0,
                height: 100.0,
            }
        );
    }

    #[test]
    fn fit_survives_empty_bounds() {
        let view = fit_view_box(
            Viewport {
                width: 80.0,
                height: 60.0,
            },
            ContentBounds {
                x: 5.0,
                y: 5.0,
                width: 0.0,
                height: 0.0,
            },
        );

        assert!(approx(view.width, 80.0));
        assert!(approx(view.height, 60.0));
        assert!(approx(view.x, 5.0 - 40.0));
        assert!(approx(view.y, 5.0 - 30.0));
    }

    #[test]
    fn zoom_keeps_the_center_fixed() {
        let view = ViewBox {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 80.0,
        };

        let zoomed = zoom_view_box(view, ZOOM_STEP);
        assert!(approx(zoomed.width, 100.0 / ZOOM_STEP));
        assert!(approx(zoomed.height, 80.0 / ZOOM_STEP));
        assert!(approx(
            zoomed.x + zoomed.width / 2.0,
            view.x + view.width / 2.0
        ));
        assert!(approx(
            zoomed.y + zoomed.height / 2.0,
            view.y + view.height / 2.0
        ));

        // Zooming back out restores the original rectangle.
        let restored = zoom_view_box(zoomed, 1.0 / ZOOM_STEP);
        assert!(approx(restored.x, view.x));
        assert!(approx(restored.width, view.width));
    }
}
