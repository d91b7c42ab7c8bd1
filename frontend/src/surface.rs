//! `web-sys` implementation of the walkthrough [`Surface`].
//!
//! The overlay is a fixed-position root appended to `body` holding four
//! backdrop panels, the highlight ring, the tooltip and a polite live region.
//! Geometry comes from the engine; this module only writes pixel styles.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, Event, EventTarget, HtmlElement, KeyboardEvent, MutationObserver,
    MutationObserverInit, MutationRecord, Node, ScrollBehavior, ScrollIntoViewOptions,
    ScrollLogicalPosition, Window,
};

use walkthrough::core::geometry::{FrameLayout, Rect, Size, TooltipPosition, Viewport};
use walkthrough::core::keyboard::{KeyPress, FOCUSABLE_SELECTOR};
use walkthrough::core::options::{ScrollMode, ThemeMode};
use walkthrough::core::surface::{
    EventDisposition, EventHandler, Overlay, OverlayConfig, Subscription, SurfaceEvent,
    TargetElement,
};
use walkthrough::core::tooltip::{TooltipAction, ACTION_ATTRIBUTE};
use walkthrough::Surface;

use crate::style;

/// Attribute marking an overlay root.
pub const ROOT_ATTRIBUTE: &str = "data-walkthrough-root";

fn action_selector() -> String {
    format!("[{ACTION_ATTRIBUTE}]")
}

fn root_selector() -> String {
    format!("[{ROOT_ATTRIBUTE}]")
}

fn px(value: f64) -> String {
    format!("{}px", value)
}

fn set_styles(element: &HtmlElement, styles: &[(&str, &str)]) {
    let style = element.style();
    for (name, value) in styles {
        if let Err(e) = style.set_property(name, value) {
            log::debug!("Failed to set style {}: {:?}", name, e);
        }
    }
}

fn place(element: &HtmlElement, rect: Rect) {
    set_styles(
        element,
        &[
            ("left", px(rect.x).as_str()),
            ("top", px(rect.y).as_str()),
            ("width", px(rect.width).as_str()),
            ("height", px(rect.height).as_str()),
        ],
    );
}

fn to_rect(dom: &web_sys::DomRect) -> Rect {
    Rect::new(dom.x(), dom.y(), dom.width(), dom.height())
}

/// Drop `value` after the current event dispatch returns.
///
/// A listener closure may be the one tearing its own overlay down; freeing it
/// while it runs is undefined behaviour in wasm-bindgen.
fn drop_later<T: 'static>(value: T) {
    wasm_bindgen_futures::spawn_local(async move {
        drop(value);
    });
}

// ============================================================================
// Listeners
// ============================================================================

/// An attached DOM listener; detaches when dropped.
struct Listener {
    target: EventTarget,
    kind: &'static str,
    capture: bool,
    closure: Option<Closure<dyn FnMut(Event)>>,
}

impl Listener {
    fn attach(
        target: &EventTarget,
        kind: &'static str,
        capture: bool,
        callback: impl FnMut(Event) + 'static,
    ) -> Option<Self> {
        let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut(Event)>);
        let attached = target.add_event_listener_with_callback_and_bool(
            kind,
            closure.as_ref().unchecked_ref(),
            capture,
        );
        if let Err(e) = attached {
            log::warn!("Failed to listen for {}: {:?}", kind, e);
            return None;
        }
        Some(Self {
            target: target.clone(),
            kind,
            capture,
            closure: Some(closure),
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(closure) = self.closure.take() {
            let _ = self.target.remove_event_listener_with_callback_and_bool(
                self.kind,
                closure.as_ref().unchecked_ref(),
                self.capture,
            );
            drop_later(closure);
        }
    }
}

/// Forward a DOM event to the engine, cancelling it if the engine handled it.
fn forward(handler: &EventHandler, event: &Event, surface_event: SurfaceEvent) {
    if handler(surface_event) == EventDisposition::Handled {
        event.prevent_default();
    }
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn nearest_element(node: &Node) -> Option<Element> {
    match node.dyn_ref::<Element>() {
        Some(element) => Some(element.clone()),
        None => node.parent_element(),
    }
}

fn is_overlay_node(node: &Node) -> bool {
    nearest_element(node)
        .and_then(|element| element.closest(&root_selector()).ok().flatten())
        .is_some()
}

/// Mutations caused by overlays themselves (tooltip renders, re-appending a
/// root to stay on top) must not feed back into repositioning.
fn is_overlay_record(record: &MutationRecord) -> bool {
    if record.target().is_some_and(|target| is_overlay_node(&target)) {
        return true;
    }
    let added = record.added_nodes();
    let removed = record.removed_nodes();
    let nodes: Vec<Node> = (0..added.length())
        .filter_map(|i| added.item(i))
        .chain((0..removed.length()).filter_map(|i| removed.item(i)))
        .collect();
    !nodes.is_empty() && nodes.iter().all(is_overlay_node)
}

struct Observer {
    observer: MutationObserver,
    closure: Option<Closure<dyn FnMut(js_sys::Array, MutationObserver)>>,
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.observer.disconnect();
        if let Some(closure) = self.closure.take() {
            drop_later(closure);
        }
    }
}

fn observe_body(body: &HtmlElement, handler: EventHandler) -> Option<Observer> {
    let closure = Closure::wrap(Box::new(move |records: js_sys::Array, _: MutationObserver| {
        let external = records
            .iter()
            .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
            .any(|record| !is_overlay_record(&record));
        if external {
            handler(SurfaceEvent::Mutation);
        }
    }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

    let observer = match MutationObserver::new(closure.as_ref().unchecked_ref()) {
        Ok(observer) => observer,
        Err(e) => {
            log::warn!("MutationObserver unavailable: {:?}", e);
            return None;
        }
    };
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    if let Err(e) = observer.observe_with_options(body, &init) {
        log::warn!("Failed to observe body: {:?}", e);
        return None;
    }
    Some(Observer {
        observer,
        closure: Some(closure),
    })
}

// ============================================================================
// Target
// ============================================================================

/// A step target resolved from the live document.
pub struct WebTarget {
    element: Element,
}

impl WebTarget {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl TargetElement for WebTarget {
    fn rect(&self) -> Option<Rect> {
        if !self.element.is_connected() {
            return None;
        }
        Some(to_rect(&self.element.get_bounding_client_rect()))
    }

    fn focus(&self) {
        let Some(element) = self.element.dyn_ref::<HtmlElement>() else {
            return;
        };
        if element.tab_index() < 0 && !element.has_attribute("tabindex") {
            let _ = element.set_attribute("tabindex", "-1");
        }
        if let Err(e) = element.focus() {
            log::debug!("Target refused focus: {:?}", e);
        }
    }

    fn scroll_into_view(&self, mode: ScrollMode) {
        let behavior = match mode {
            ScrollMode::None => return,
            ScrollMode::Smooth => ScrollBehavior::Smooth,
            ScrollMode::Instant => ScrollBehavior::Instant,
        };
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(behavior);
        options.set_block(ScrollLogicalPosition::Center);
        options.set_inline(ScrollLogicalPosition::Nearest);
        self.element
            .scroll_into_view_with_scroll_into_view_options(&options);
    }

    fn on_click(&self, handler: EventHandler) -> Subscription {
        let listener = Listener::attach(&self.element, "click", false, move |_event| {
            // The click still reaches the page.
            handler(SurfaceEvent::TargetClick);
        });
        Subscription::new(move || drop(listener))
    }
}

// ============================================================================
// Overlay
// ============================================================================

/// Overlay nodes of one engine.
pub struct WebOverlay {
    document: Document,
    root: HtmlElement,
    panels: [HtmlElement; 4],
    ring: HtmlElement,
    tooltip: HtmlElement,
    live: HtmlElement,
    listeners: RefCell<Vec<Listener>>,
}

impl WebOverlay {
    fn build(document: &Document, config: &OverlayConfig, handler: EventHandler) -> Option<Self> {
        let body = document.body()?;
        let div = |class: &str| -> Option<HtmlElement> {
            let element = document.create_element("div").ok()?;
            if config.theme != ThemeMode::Unstyled {
                element.set_class_name(class);
            }
            element.dyn_into::<HtmlElement>().ok()
        };

        let root = div("wt-overlay")?;
        let _ = root.set_attribute(ROOT_ATTRIBUTE, "");
        set_styles(
            &root,
            &[
                ("position", "fixed"),
                ("inset", "0"),
                ("pointer-events", "none"),
                ("z-index", config.z_index.to_string().as_str()),
            ],
        );

        let backdrop = format!("rgba(0, 0, 0, {})", config.backdrop_opacity.clamp(0.0, 1.0));
        let panels = [
            div("wt-backdrop")?,
            div("wt-backdrop")?,
            div("wt-backdrop")?,
            div("wt-backdrop")?,
        ];
        for panel in &panels {
            set_styles(
                panel,
                &[
                    ("position", "fixed"),
                    ("pointer-events", "auto"),
                    ("background", backdrop.as_str()),
                ],
            );
            root.append_child(panel).ok()?;
        }

        let ring = div("wt-ring")?;
        set_styles(&ring, &[("position", "fixed"), ("pointer-events", "none")]);
        root.append_child(&ring).ok()?;

        let tooltip = div("wt-tooltip")?;
        set_styles(
            &tooltip,
            &[
                ("position", "fixed"),
                ("left", "0px"),
                ("top", "0px"),
                ("pointer-events", "auto"),
                ("visibility", "hidden"),
            ],
        );
        root.append_child(&tooltip).ok()?;

        let live = div("wt-live")?;
        let _ = live.set_attribute("aria-live", "polite");
        let _ = live.set_attribute("aria-atomic", "true");
        set_styles(&live, &style::VISUALLY_HIDDEN);
        root.append_child(&live).ok()?;

        if config.theme == ThemeMode::Default {
            style::inject_default_styles(document);
        }

        let mut listeners = Vec::new();
        for panel in &panels {
            let handler = handler.clone();
            listeners.extend(Listener::attach(panel, "click", false, move |event| {
                forward(&handler, &event, SurfaceEvent::BackdropClick);
            }));
        }
        let actions = handler.clone();
        listeners.extend(Listener::attach(&tooltip, "click", false, move |event| {
            let action = event_element(&event)
                .and_then(|element| element.closest(&action_selector()).ok().flatten())
                .and_then(|button| button.get_attribute(ACTION_ATTRIBUTE))
                .and_then(|value| TooltipAction::parse(&value));
            if let Some(action) = action {
                forward(&actions, &event, SurfaceEvent::Action(action));
            }
        }));

        body.append_child(&root).ok()?;

        Some(Self {
            document: document.clone(),
            root,
            panels,
            ring,
            tooltip,
            live,
            listeners: RefCell::new(listeners),
        })
    }

    fn focusables(&self) -> Vec<HtmlElement> {
        let Ok(list) = self.tooltip.query_selector_all(FOCUSABLE_SELECTOR) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<HtmlElement>().ok())
            .collect()
    }

    pub fn root(&self) -> &HtmlElement {
        &self.root
    }

    pub fn tooltip(&self) -> &HtmlElement {
        &self.tooltip
    }
}

impl Overlay for WebOverlay {
    fn apply_frame(&self, frame: &FrameLayout) {
        for (panel, rect) in self.panels.iter().zip(frame.panels()) {
            place(panel, rect);
        }
        place(&self.ring, frame.ring);
    }

    fn set_tooltip_html(&self, html: &str) {
        self.tooltip.set_inner_html(html);
    }

    fn tooltip_size(&self) -> Size {
        let rect = self.tooltip.get_bounding_client_rect();
        Size::new(rect.width(), rect.height())
    }

    fn move_tooltip(&self, position: &TooltipPosition) {
        set_styles(
            &self.tooltip,
            &[
                ("left", px(position.at.x).as_str()),
                ("top", px(position.at.y).as_str()),
                ("visibility", "visible"),
            ],
        );
        let _ = self
            .tooltip
            .set_attribute("data-placement", position.placement.as_str());
    }

    fn announce(&self, text: &str) {
        self.live.set_text_content(Some(text));
    }

    fn focusable_count(&self) -> usize {
        self.focusables().len()
    }

    fn focused_index(&self) -> Option<usize> {
        let active: Node = self.document.active_element()?.into();
        self.focusables()
            .iter()
            .position(|element| element.is_same_node(Some(&active)))
    }

    fn focus_at(&self, index: usize) {
        if let Some(element) = self.focusables().get(index) {
            let _ = element.focus();
        }
    }

    fn bring_to_front(&self) {
        let Some(body) = self.document.body() else {
            return;
        };
        let root: &Node = &self.root;
        let last = body.last_element_child();
        if last.is_some_and(|last| last.is_same_node(Some(root))) {
            return;
        }
        let _ = body.append_child(&self.root);
    }

    fn remove(&self) {
        self.listeners.borrow_mut().clear();
        self.root.remove();
    }
}

impl Drop for WebOverlay {
    fn drop(&mut self) {
        self.root.remove();
    }
}

// ============================================================================
// Surface
// ============================================================================

/// The browser document.
pub struct WebSurface {
    window: Window,
    document: Document,
    lock_depth: Cell<u32>,
    saved_overflow: RefCell<Option<String>>,
}

impl WebSurface {
    /// `None` outside a browser main thread.
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self {
            window,
            document,
            lock_depth: Cell::new(0),
            saved_overflow: RefCell::new(None),
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn dimension(value: Result<JsValue, JsValue>) -> f64 {
        value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
    }
}

impl Surface for WebSurface {
    fn is_interactive(&self) -> bool {
        self.document.body().is_some()
    }

    fn query(&self, selector: &str) -> Option<Rc<dyn TargetElement>> {
        match self.document.query_selector(selector) {
            Ok(found) => found.map(|element| Rc::new(WebTarget::new(element)) as Rc<dyn TargetElement>),
            Err(e) => {
                log::warn!("Invalid selector {}: {:?}", selector, e);
                None
            }
        }
    }

    fn viewport(&self) -> Viewport {
        Size::new(
            Self::dimension(self.window.inner_width()),
            Self::dimension(self.window.inner_height()),
        )
    }

    fn create_overlay(
        &self,
        config: &OverlayConfig,
        handler: EventHandler,
    ) -> Option<Box<dyn Overlay>> {
        WebOverlay::build(&self.document, config, handler)
            .map(|overlay| Box::new(overlay) as Box<dyn Overlay>)
    }

    fn set_scroll_locked(&self, locked: bool) {
        let Some(body) = self.document.body() else {
            return;
        };
        let style = body.style();
        let depth = self.lock_depth.get();
        if locked {
            if depth == 0 {
                let previous = style.get_property_value("overflow").unwrap_or_default();
                *self.saved_overflow.borrow_mut() = Some(previous);
                let _ = style.set_property("overflow", "hidden");
            }
            self.lock_depth.set(depth + 1);
        } else if depth > 0 {
            self.lock_depth.set(depth - 1);
            if depth == 1 {
                match self.saved_overflow.borrow_mut().take() {
                    Some(previous) if !previous.is_empty() => {
                        let _ = style.set_property("overflow", &previous);
                    }
                    _ => {
                        let _ = style.remove_property("overflow");
                    }
                }
            }
        }
    }

    fn listen(&self, handler: EventHandler) -> Subscription {
        let mut listeners = Vec::new();

        let resize = handler.clone();
        listeners.extend(Listener::attach(&self.window, "resize", false, move |_| {
            resize(SurfaceEvent::Resize);
        }));

        let scroll = handler.clone();
        listeners.extend(Listener::attach(&self.window, "scroll", true, move |_| {
            scroll(SurfaceEvent::Scroll);
        }));

        let keys = handler.clone();
        let document = self.document.clone();
        listeners.extend(Listener::attach(&self.document, "keydown", false, move |event| {
            let Some(key_event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            let key = key_event.key();
            // A focused tooltip button activates itself on Enter.
            if key == "Enter" && focus_on_action(&document) {
                return;
            }
            let press = if key_event.shift_key() {
                KeyPress::with_shift(key)
            } else {
                KeyPress::new(key)
            };
            forward(&keys, &event, SurfaceEvent::Key(press));
        }));

        let observer = self
            .document
            .body()
            .and_then(|body| observe_body(&body, handler));

        Subscription::new(move || {
            drop(observer);
            drop(listeners);
        })
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()> {
        let ms = u32::try_from(ms).unwrap_or(u32::MAX);
        gloo_timers::future::TimeoutFuture::new(ms).boxed_local()
    }

    fn now_ms(&self) -> f64 {
        self.window
            .performance()
            .map(|performance| performance.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}

impl std::fmt::Debug for WebSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSurface")
            .field("scroll_lock_depth", &self.lock_depth.get())
            .finish()
    }
}

fn focus_on_action(document: &Document) -> bool {
    document
        .active_element()
        .and_then(|element| element.closest(&action_selector()).ok().flatten())
        .is_some()
}
