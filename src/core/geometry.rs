//! Overlay geometry.
//!
//! The spotlight is drawn as four backdrop panels framing the padded target
//! box rather than a single masked layer, so each panel can take clicks on its
//! own. Tooltip placement is a fixed-priority heuristic: below, above, right,
//! left, then a clamped "below" fallback.

use serde::{Deserialize, Serialize};

/// Inset from the viewport edge that a tooltip must respect.
pub const VIEWPORT_MARGIN: f64 = 4.0;
/// Distance between the padded box and the tooltip.
pub const TOOLTIP_GAP: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Grow the rectangle by `padding` on every side.
    pub fn padded(&self, padding: f64) -> Rect {
        Rect::new(
            self.x - padding,
            self.y - padding,
            self.width + padding * 2.0,
            self.height + padding * 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Visible area of the document, in CSS pixels.
pub type Viewport = Size;

/// Four backdrop panels plus the highlight ring.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameLayout {
    pub top: Rect,
    pub left: Rect,
    pub right: Rect,
    pub bottom: Rect,
    pub ring: Rect,
}

impl FrameLayout {
    pub fn panels(&self) -> [Rect; 4] {
        [self.top, self.left, self.right, self.bottom]
    }
}

/// Compute the backdrop frame around `target` grown by `padding`.
pub fn frame_around(target: Rect, padding: f64, viewport: Viewport) -> FrameLayout {
    let ring = target.padded(padding.max(0.0));
    let top_edge = ring.y.max(0.0);
    let bottom_edge = ring.bottom().min(viewport.height).max(top_edge);
    let band = bottom_edge - top_edge;

    FrameLayout {
        top: Rect::new(0.0, 0.0, viewport.width, top_edge.min(viewport.height)),
        left: Rect::new(0.0, top_edge, ring.x.max(0.0).min(viewport.width), band),
        right: Rect::new(
            ring.right().max(0.0).min(viewport.width),
            top_edge,
            (viewport.width - ring.right()).max(0.0),
            band,
        ),
        bottom: Rect::new(
            0.0,
            bottom_edge,
            viewport.width,
            (viewport.height - bottom_edge).max(0.0),
        ),
        ring,
    }
}

/// Side of the target the tooltip ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Below,
    Above,
    Right,
    Left,
    /// No candidate fit; "below" clamped into the viewport.
    Clamped,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Below => "below",
            Placement::Above => "above",
            Placement::Right => "right",
            Placement::Left => "left",
            Placement::Clamped => "clamped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TooltipPosition {
    pub placement: Placement,
    pub at: Point,
}

/// Place a tooltip of `tooltip` size next to the padded box `anchor`.
pub fn place_tooltip(anchor: Rect, tooltip: Size, viewport: Viewport) -> TooltipPosition {
    let centered_x = anchor.center_x() - tooltip.width / 2.0;
    let centered_y = anchor.center_y() - tooltip.height / 2.0;
    let below = Point {
        x: centered_x,
        y: anchor.bottom() + TOOLTIP_GAP,
    };

    let candidates = [
        (Placement::Below, below),
        (
            Placement::Above,
            Point {
                x: centered_x,
                y: anchor.y - TOOLTIP_GAP - tooltip.height,
            },
        ),
        (
            Placement::Right,
            Point {
                x: anchor.right() + TOOLTIP_GAP,
                y: centered_y,
            },
        ),
        (
            Placement::Left,
            Point {
                x: anchor.x - TOOLTIP_GAP - tooltip.width,
                y: centered_y,
            },
        ),
    ];

    for (placement, at) in candidates {
        if fits(at, tooltip, viewport) {
            return TooltipPosition { placement, at };
        }
    }

    TooltipPosition {
        placement: Placement::Clamped,
        at: Point {
            x: clamp_axis(below.x, tooltip.width, viewport.width),
            y: clamp_axis(below.y, tooltip.height, viewport.height),
        },
    }
}

fn fits(at: Point, size: Size, viewport: Viewport) -> bool {
    at.x >= VIEWPORT_MARGIN
        && at.y >= VIEWPORT_MARGIN
        && at.x + size.width <= viewport.width - VIEWPORT_MARGIN
        && at.y + size.height <= viewport.height - VIEWPORT_MARGIN
}

// Oversized tooltips pin to the leading margin.
fn clamp_axis(value: f64, extent: f64, available: f64) -> f64 {
    let max = (available - VIEWPORT_MARGIN - extent).max(VIEWPORT_MARGIN);
    value.clamp(VIEWPORT_MARGIN, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const VIEWPORT: Viewport = Size {
        width: 1000.0,
        height: 800.0,
    };

    #[test]
    fn test_frame_is_complement_of_padded_box() {
        let frame = frame_around(Rect::new(100.0, 200.0, 50.0, 40.0), 8.0, VIEWPORT);

        assert_eq!(frame.ring, Rect::new(92.0, 192.0, 66.0, 56.0));
        assert_eq!(frame.top, Rect::new(0.0, 0.0, 1000.0, 192.0));
        assert_eq!(frame.left, Rect::new(0.0, 192.0, 92.0, 56.0));
        assert_eq!(frame.right, Rect::new(158.0, 192.0, 842.0, 56.0));
        assert_eq!(frame.bottom, Rect::new(0.0, 248.0, 1000.0, 552.0));
    }

    #[test]
    fn test_frame_clamps_at_viewport_edges() {
        let frame = frame_around(Rect::new(-20.0, -10.0, 40.0, 30.0), 4.0, VIEWPORT);
        assert_eq!(frame.top.height, 0.0);
        assert_eq!(frame.left.width, 0.0);
        assert!(frame.bottom.y >= 0.0);
    }

    #[test]
    fn test_tooltip_prefers_below() {
        let anchor = Rect::new(400.0, 100.0, 200.0, 40.0);
        let pos = place_tooltip(anchor, Size::new(300.0, 120.0), VIEWPORT);
        assert_eq!(pos.placement, Placement::Below);
        assert_eq!(pos.at, Point { x: 350.0, y: 150.0 });
    }

    #[test]
    fn test_tooltip_flips_above_near_bottom() {
        let anchor = Rect::new(400.0, 700.0, 200.0, 40.0);
        let pos = place_tooltip(anchor, Size::new(300.0, 120.0), VIEWPORT);
        assert_eq!(pos.placement, Placement::Above);
        assert_eq!(pos.at.y, 700.0 - TOOLTIP_GAP - 120.0);
    }

    #[test]
    fn test_tooltip_goes_right_then_left() {
        // Tall anchor leaves no room above or below.
        let tall_left = Rect::new(10.0, 10.0, 100.0, 780.0);
        let pos = place_tooltip(tall_left, Size::new(300.0, 120.0), VIEWPORT);
        assert_eq!(pos.placement, Placement::Right);

        let tall_right = Rect::new(880.0, 10.0, 100.0, 780.0);
        let pos = place_tooltip(tall_right, Size::new(300.0, 120.0), VIEWPORT);
        assert_eq!(pos.placement, Placement::Left);
    }

    #[test]
    fn test_tooltip_clamped_fallback() {
        let everywhere = Rect::new(0.0, 0.0, 1000.0, 800.0);
        let pos = place_tooltip(everywhere, Size::new(300.0, 120.0), VIEWPORT);
        assert_eq!(pos.placement, Placement::Clamped);
        assert_eq!(pos.at, Point { x: 350.0, y: 676.0 });
    }

    proptest! {
        #[test]
        fn prop_frame_panels_never_negative(
            x in -500.0f64..1500.0,
            y in -500.0f64..1300.0,
            w in 0.0f64..600.0,
            h in 0.0f64..600.0,
            padding in 0.0f64..40.0,
        ) {
            let frame = frame_around(Rect::new(x, y, w, h), padding, VIEWPORT);
            for panel in frame.panels() {
                prop_assert!(panel.width >= 0.0);
                prop_assert!(panel.height >= 0.0);
            }
        }

        #[test]
        fn prop_tooltip_stays_in_viewport_when_it_can(
            x in 0.0f64..1000.0,
            y in 0.0f64..800.0,
            w in 0.0f64..300.0,
            h in 0.0f64..300.0,
            tw in 50.0f64..400.0,
            th in 40.0f64..300.0,
        ) {
            let pos = place_tooltip(Rect::new(x, y, w, h), Size::new(tw, th), VIEWPORT);
            prop_assert!(pos.at.x >= VIEWPORT_MARGIN);
            prop_assert!(pos.at.y >= VIEWPORT_MARGIN);
            prop_assert!(pos.at.x + tw <= VIEWPORT.width - VIEWPORT_MARGIN);
            prop_assert!(pos.at.y + th <= VIEWPORT.height - VIEWPORT_MARGIN);
        }
    }
}
