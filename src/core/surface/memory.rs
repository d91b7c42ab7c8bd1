//! In-memory surface with a virtual clock.
//!
//! `sleep` advances the clock instead of waiting, elements can be scheduled to
//! appear at a virtual time, and spawned tasks queue until [`MemorySurface::flush`]
//! drives them. Tests and headless hosts get fully deterministic tours.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use super::{
    EventDisposition, EventHandler, Overlay, OverlayConfig, Subscription, Surface, SurfaceEvent,
    TargetElement,
};
use crate::core::geometry::{FrameLayout, Rect, Size, TooltipPosition, Viewport};
use crate::core::keyboard::KeyPress;
use crate::core::options::ScrollMode;
use crate::core::tooltip::TooltipAction;

type HandlerMap = Rc<RefCell<BTreeMap<u64, EventHandler>>>;

fn fire(handlers: &HandlerMap, event: SurfaceEvent) -> EventDisposition {
    let snapshot: Vec<EventHandler> = handlers.borrow().values().cloned().collect();
    let mut disposition = EventDisposition::Ignored;
    for handler in snapshot {
        if handler(event.clone()) == EventDisposition::Handled {
            disposition = EventDisposition::Handled;
        }
    }
    disposition
}

fn subscribe(handlers: &HandlerMap, id: u64, handler: EventHandler) -> Subscription {
    handlers.borrow_mut().insert(id, handler);
    let weak = Rc::downgrade(handlers);
    Subscription::new(move || {
        if let Some(handlers) = weak.upgrade() {
            handlers.borrow_mut().remove(&id);
        }
    })
}

// ============================================================================
// Elements
// ============================================================================

/// An element of the in-memory document.
pub struct MemoryElement {
    selector: String,
    rect: Cell<Rect>,
    appears_at: Cell<f64>,
    attached: Cell<bool>,
    focus_count: Cell<u32>,
    scrolls: RefCell<Vec<ScrollMode>>,
    click_handlers: HandlerMap,
    next_id: Cell<u64>,
}

impl MemoryElement {
    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn set_rect(&self, rect: Rect) {
        self.rect.set(rect);
    }

    pub fn focus_count(&self) -> u32 {
        self.focus_count.get()
    }

    pub fn scrolls(&self) -> Vec<ScrollMode> {
        self.scrolls.borrow().clone()
    }

    pub fn click_listener_count(&self) -> usize {
        self.click_handlers.borrow().len()
    }

    /// Simulate a user click on the element.
    pub fn click(&self) -> EventDisposition {
        fire(&self.click_handlers, SurfaceEvent::TargetClick)
    }
}

impl TargetElement for MemoryElement {
    fn rect(&self) -> Option<Rect> {
        self.attached.get().then(|| self.rect.get())
    }

    fn focus(&self) {
        self.focus_count.set(self.focus_count.get() + 1);
    }

    fn scroll_into_view(&self, mode: ScrollMode) {
        self.scrolls.borrow_mut().push(mode);
    }

    fn on_click(&self, handler: EventHandler) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        subscribe(&self.click_handlers, id, handler)
    }
}

// ============================================================================
// Overlay
// ============================================================================

/// Observable state of an overlay built by [`MemorySurface`].
pub struct MemoryOverlayState {
    pub config: OverlayConfig,
    handler: EventHandler,
    tooltip_size: Size,
    frame: Cell<Option<FrameLayout>>,
    tooltip_html: RefCell<String>,
    tooltip_position: Cell<Option<TooltipPosition>>,
    announcements: RefCell<Vec<String>>,
    focused: Cell<Option<usize>>,
    raised: Cell<u32>,
    removed: Cell<bool>,
}

impl MemoryOverlayState {
    pub fn frame(&self) -> Option<FrameLayout> {
        self.frame.get()
    }

    pub fn tooltip_html(&self) -> String {
        self.tooltip_html.borrow().clone()
    }

    pub fn tooltip_position(&self) -> Option<TooltipPosition> {
        self.tooltip_position.get()
    }

    pub fn announcements(&self) -> Vec<String> {
        self.announcements.borrow().clone()
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused.get()
    }

    /// Move focus as a user would (`None` = outside the tooltip).
    pub fn set_focused(&self, index: Option<usize>) {
        self.focused.set(index);
    }

    pub fn raised(&self) -> u32 {
        self.raised.get()
    }

    pub fn is_removed(&self) -> bool {
        self.removed.get()
    }

    /// Simulate a click on a tooltip button.
    pub fn click_action(&self, action: TooltipAction) -> EventDisposition {
        if self.removed.get() {
            return EventDisposition::Ignored;
        }
        (self.handler)(SurfaceEvent::Action(action))
    }

    pub fn click_backdrop(&self) -> EventDisposition {
        if self.removed.get() {
            return EventDisposition::Ignored;
        }
        (self.handler)(SurfaceEvent::BackdropClick)
    }
}

struct MemoryOverlay(Rc<MemoryOverlayState>);

impl Overlay for MemoryOverlay {
    fn apply_frame(&self, frame: &FrameLayout) {
        self.0.frame.set(Some(*frame));
    }

    fn set_tooltip_html(&self, html: &str) {
        *self.0.tooltip_html.borrow_mut() = html.to_string();
        self.0.focused.set(None);
    }

    fn tooltip_size(&self) -> Size {
        self.0.tooltip_size
    }

    fn move_tooltip(&self, position: &TooltipPosition) {
        self.0.tooltip_position.set(Some(*position));
    }

    fn announce(&self, text: &str) {
        self.0.announcements.borrow_mut().push(text.to_string());
    }

    fn focusable_count(&self) -> usize {
        let html = self.0.tooltip_html.borrow();
        html.matches("<button").count() + html.matches("<a href").count()
    }

    fn focused_index(&self) -> Option<usize> {
        self.0.focused.get()
    }

    fn focus_at(&self, index: usize) {
        self.0.focused.set(Some(index));
    }

    fn bring_to_front(&self) {
        self.0.raised.set(self.0.raised.get() + 1);
    }

    fn remove(&self) {
        self.0.removed.set(true);
    }
}

// ============================================================================
// Surface
// ============================================================================

/// Deterministic in-memory document.
pub struct MemorySurface {
    interactive: bool,
    viewport: Cell<Viewport>,
    tooltip_size: Cell<Size>,
    clock: Cell<f64>,
    elements: RefCell<HashMap<String, Rc<MemoryElement>>>,
    listeners: HandlerMap,
    next_id: Cell<u64>,
    overlays: RefCell<Vec<Rc<MemoryOverlayState>>>,
    scroll_locked: Cell<bool>,
    tasks: RefCell<VecDeque<LocalBoxFuture<'static, ()>>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::with_interactivity(true)
    }

    /// A surface reporting no usable document.
    pub fn non_interactive() -> Self {
        Self::with_interactivity(false)
    }

    fn with_interactivity(interactive: bool) -> Self {
        Self {
            interactive,
            viewport: Cell::new(Size::new(1024.0, 768.0)),
            tooltip_size: Cell::new(Size::new(280.0, 140.0)),
            clock: Cell::new(0.0),
            elements: RefCell::new(HashMap::new()),
            listeners: Rc::new(RefCell::new(BTreeMap::new())),
            next_id: Cell::new(0),
            overlays: RefCell::new(Vec::new()),
            scroll_locked: Cell::new(false),
            tasks: RefCell::new(VecDeque::new()),
        }
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.viewport.set(viewport);
    }

    pub fn set_tooltip_size(&self, size: Size) {
        self.tooltip_size.set(size);
    }

    /// Add an element that is present immediately.
    pub fn add_element(&self, selector: &str, rect: Rect) -> Rc<MemoryElement> {
        self.add_element_at(selector, rect, 0.0)
    }

    /// Add an element that becomes queryable at virtual time `appears_at`.
    pub fn add_element_at(&self, selector: &str, rect: Rect, appears_at: f64) -> Rc<MemoryElement> {
        let element = Rc::new(MemoryElement {
            selector: selector.to_string(),
            rect: Cell::new(rect),
            appears_at: Cell::new(appears_at),
            attached: Cell::new(true),
            focus_count: Cell::new(0),
            scrolls: RefCell::new(Vec::new()),
            click_handlers: Rc::new(RefCell::new(BTreeMap::new())),
            next_id: Cell::new(0),
        });
        self.elements
            .borrow_mut()
            .insert(selector.to_string(), element.clone());
        element
    }

    pub fn remove_element(&self, selector: &str) {
        if let Some(element) = self.elements.borrow_mut().remove(selector) {
            element.attached.set(false);
        }
    }

    pub fn element(&self, selector: &str) -> Option<Rc<MemoryElement>> {
        self.elements.borrow().get(selector).cloned()
    }

    pub fn now(&self) -> f64 {
        self.clock.get()
    }

    pub fn advance(&self, ms: f64) {
        self.clock.set(self.clock.get() + ms);
    }

    pub fn is_scroll_locked(&self) -> bool {
        self.scroll_locked.get()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn overlays(&self) -> Vec<Rc<MemoryOverlayState>> {
        self.overlays.borrow().clone()
    }

    /// Most recently created overlay that is still attached.
    pub fn active_overlay(&self) -> Option<Rc<MemoryOverlayState>> {
        self.overlays
            .borrow()
            .iter()
            .rev()
            .find(|overlay| !overlay.is_removed())
            .cloned()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Deliver a window-level event to every listener.
    pub fn dispatch(&self, event: SurfaceEvent) -> EventDisposition {
        fire(&self.listeners, event)
    }

    pub fn press(&self, key: &str) -> EventDisposition {
        self.dispatch(SurfaceEvent::Key(KeyPress::new(key)))
    }

    pub fn press_with_shift(&self, key: &str) -> EventDisposition {
        self.dispatch(SurfaceEvent::Key(KeyPress::with_shift(key)))
    }

    /// Run queued tasks, including ones they spawn, until the queue is empty.
    pub async fn flush(&self) {
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => task.await,
                None => break,
            }
        }
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for MemorySurface {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn query(&self, selector: &str) -> Option<Rc<dyn TargetElement>> {
        let element = self.elements.borrow().get(selector).cloned()?;
        if element.appears_at.get() > self.clock.get() {
            return None;
        }
        Some(element as Rc<dyn TargetElement>)
    }

    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn create_overlay(
        &self,
        config: &OverlayConfig,
        handler: EventHandler,
    ) -> Option<Box<dyn Overlay>> {
        let state = Rc::new(MemoryOverlayState {
            config: config.clone(),
            handler,
            tooltip_size: self.tooltip_size.get(),
            frame: Cell::new(None),
            tooltip_html: RefCell::new(String::new()),
            tooltip_position: Cell::new(None),
            announcements: RefCell::new(Vec::new()),
            focused: Cell::new(None),
            raised: Cell::new(0),
            removed: Cell::new(false),
        });
        self.overlays.borrow_mut().push(state.clone());
        Some(Box::new(MemoryOverlay(state)))
    }

    fn set_scroll_locked(&self, locked: bool) {
        self.scroll_locked.set(locked);
    }

    fn listen(&self, handler: EventHandler) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        subscribe(&self.listeners, id, handler)
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.tasks.borrow_mut().push_back(task);
    }

    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()> {
        self.advance(ms as f64);
        Box::pin(futures::future::ready(()))
    }

    fn now_ms(&self) -> f64 {
        self.clock.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_element_appears_with_clock() {
        let surface = MemorySurface::new();
        surface.add_element_at("#late", Rect::new(0.0, 0.0, 10.0, 10.0), 300.0);
        assert!(surface.query("#late").is_none());
        surface.advance(300.0);
        assert!(surface.query("#late").is_some());
    }

    #[test]
    fn test_removed_element_loses_rect() {
        let surface = MemorySurface::new();
        let element = surface.add_element("#a", Rect::new(1.0, 2.0, 3.0, 4.0));
        assert!(element.rect().is_some());
        surface.remove_element("#a");
        assert!(element.rect().is_none());
        assert!(surface.query("#a").is_none());
    }

    #[test]
    fn test_listener_subscription_drop() {
        let surface = MemorySurface::new();
        let sub = surface.listen(Rc::new(|_| EventDisposition::Handled));
        assert_eq!(surface.listener_count(), 1);
        assert_eq!(surface.press("Escape"), EventDisposition::Handled);
        drop(sub);
        assert_eq!(surface.listener_count(), 0);
        assert_eq!(surface.press("Escape"), EventDisposition::Ignored);
    }

    #[tokio::test]
    async fn test_flush_runs_nested_tasks() {
        let surface = Rc::new(MemorySurface::new());
        let hits = Rc::new(Cell::new(0));
        let (inner_surface, inner_hits) = (surface.clone(), hits.clone());
        surface.spawn(Box::pin(async move {
            inner_hits.set(inner_hits.get() + 1);
            let nested_hits = inner_hits.clone();
            inner_surface.spawn(Box::pin(async move {
                nested_hits.set(nested_hits.get() + 1);
            }));
        }));
        surface.flush().await;
        assert_eq!(hits.get(), 2);
        assert_eq!(surface.pending_tasks(), 0);
    }
}
