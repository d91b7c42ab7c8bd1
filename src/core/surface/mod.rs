//! Host document abstraction.
//!
//! The engine never touches a DOM directly. A [`Surface`] resolves selectors,
//! builds the overlay, delivers window events and provides timers and a task
//! spawner. Browser hosts implement it over `web-sys`; [`MemorySurface`] is a
//! deterministic in-memory document for headless hosts and tests.

mod memory;

pub use memory::{MemoryElement, MemoryOverlayState, MemorySurface};

use std::rc::Rc;

use futures::future::LocalBoxFuture;

use super::geometry::{FrameLayout, Rect, Size, TooltipPosition, Viewport};
use super::keyboard::KeyPress;
use super::options::{ScrollMode, ThemeMode, WalkthroughOptions};
use super::tooltip::TooltipAction;

// ============================================================================
// Events
// ============================================================================

/// Events a surface delivers to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Resize,
    /// Scroll on any ancestor (capture phase).
    Scroll,
    /// A DOM mutation under `body`.
    Mutation,
    Key(KeyPress),
    /// Click on a tooltip button.
    Action(TooltipAction),
    BackdropClick,
    TargetClick,
}

/// Whether the engine consumed an event (hosts call `preventDefault`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Ignored,
    Handled,
}

pub type EventHandler = Rc<dyn Fn(SurfaceEvent) -> EventDisposition>;

/// Listener registration; detaches when dropped.
#[must_use = "dropping a Subscription detaches the listener"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A subscription with nothing to detach.
    pub fn noop() -> Self {
        Self { detach: None }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Overlay appearance fixed at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub z_index: i32,
    pub backdrop_opacity: f64,
    pub theme: ThemeMode,
    pub always_on_top: bool,
}

impl From<&WalkthroughOptions> for OverlayConfig {
    fn from(options: &WalkthroughOptions) -> Self {
        Self {
            z_index: options.z_index,
            backdrop_opacity: options.backdrop_opacity,
            theme: options.theme,
            always_on_top: options.always_on_top,
        }
    }
}

/// The overlay nodes one engine owns: four backdrop panels, the highlight
/// ring, the tooltip and an offscreen live region.
pub trait Overlay {
    fn apply_frame(&self, frame: &FrameLayout);
    fn set_tooltip_html(&self, html: &str);
    fn tooltip_size(&self) -> Size;
    fn move_tooltip(&self, position: &TooltipPosition);
    /// Write to the polite live region.
    fn announce(&self, text: &str);
    /// Number of focusable elements inside the tooltip.
    fn focusable_count(&self) -> usize;
    /// Index of the focused tooltip element, `None` when focus is elsewhere.
    fn focused_index(&self) -> Option<usize>;
    fn focus_at(&self, index: usize);
    /// Re-append the overlay as the last child of `body` if it is not.
    fn bring_to_front(&self);
    fn remove(&self);
}

/// A resolved step target.
pub trait TargetElement {
    /// Bounding client rect; `None` once detached.
    fn rect(&self) -> Option<Rect>;
    fn focus(&self);
    fn scroll_into_view(&self, mode: ScrollMode);
    fn on_click(&self, handler: EventHandler) -> Subscription;
}

/// Host document, timers and task spawner.
pub trait Surface {
    /// `false` when no usable document exists (server rendering, workers).
    fn is_interactive(&self) -> bool;
    fn query(&self, selector: &str) -> Option<Rc<dyn TargetElement>>;
    fn viewport(&self) -> Viewport;
    /// Build and attach the overlay; `None` if the host cannot.
    fn create_overlay(&self, config: &OverlayConfig, handler: EventHandler)
        -> Option<Box<dyn Overlay>>;
    fn set_scroll_locked(&self, locked: bool);
    /// Subscribe to resize, capture-phase scroll, keydown and body mutations.
    fn listen(&self, handler: EventHandler) -> Subscription;
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()>;
    /// Monotonic milliseconds.
    fn now_ms(&self) -> f64;
}

// ============================================================================
// Null Surface
// ============================================================================

/// Surface of a host without a document. Engines stay inert on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn is_interactive(&self) -> bool {
        false
    }

    fn query(&self, _selector: &str) -> Option<Rc<dyn TargetElement>> {
        None
    }

    fn viewport(&self) -> Viewport {
        Size::default()
    }

    fn create_overlay(
        &self,
        _config: &OverlayConfig,
        _handler: EventHandler,
    ) -> Option<Box<dyn Overlay>> {
        None
    }

    fn set_scroll_locked(&self, _locked: bool) {}

    fn listen(&self, _handler: EventHandler) -> Subscription {
        Subscription::noop()
    }

    // Nothing runs on a host without a document.
    fn spawn(&self, _task: LocalBoxFuture<'static, ()>) {}

    fn sleep(&self, _ms: u64) -> LocalBoxFuture<'static, ()> {
        Box::pin(futures::future::ready(()))
    }

    fn now_ms(&self) -> f64 {
        0.0
    }
}
