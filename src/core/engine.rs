//! Walkthrough Engine
//!
//! Drives one tour from `start()` to a terminal state. The engine owns the
//! overlay it builds, the window listeners it attaches and the persisted
//! progress record for its tour id.
//!
//! # Lifecycle
//! constructed → `start()` → `go(i)`* → `finish()` | `skip()` | `destroy()`
//!
//! Terminal states release every resource through a single teardown routine
//! and end the instance; it cannot be restarted. Every resume point after an
//! `await` re-checks the active flag because the instance may have been torn
//! down while a hook or poll was pending.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::future::FutureExt;
use serde_json::json;

use super::geometry::{frame_around, place_tooltip};
use super::host::Host;
use super::keyboard::{command_for, trap_target, KeyCommand, KeyPress};
use super::options::{ScrollMode, WalkthroughOptions};
use super::progress::{self, ProgressRecord};
use super::step::{Step, StepHook};
use super::surface::{
    EventDisposition, EventHandler, Overlay, OverlayConfig, Subscription, SurfaceEvent,
    TargetElement,
};
use super::tooltip::{self, TooltipAction};

const CATEGORY: &str = "engine";

/// Skip reason used when a required step's element never appears.
pub fn required_missing_reason(selector: &str) -> String {
    format!("Required element not found for selector: {selector}")
}

#[derive(Default)]
struct EngineState {
    current: Option<usize>,
    active: bool,
    ended: bool,
    overlay: Option<Box<dyn Overlay>>,
    listener: Option<Subscription>,
    target: Option<Rc<dyn TargetElement>>,
    target_click: Option<Subscription>,
    trap_armed: bool,
    scroll_locked: bool,
}

struct Inner {
    host: Host,
    steps: Vec<Step>,
    options: WalkthroughOptions,
    state: RefCell<EngineState>,
}

/// Handle to one tour instance. Clones drive the same instance.
#[derive(Clone)]
pub struct Walkthrough {
    inner: Rc<Inner>,
}

/// Construct a walkthrough and start it at step 0 on the host's task spawner.
pub fn start_walkthrough(host: Host, steps: Vec<Step>, options: WalkthroughOptions) -> Walkthrough {
    let walkthrough = Walkthrough::new(host, steps, options);
    let runner = walkthrough.clone();
    walkthrough
        .inner
        .host
        .surface
        .spawn(async move { runner.start(0).await }.boxed_local());
    walkthrough
}

impl Walkthrough {
    /// Create an inert instance. Nothing touches the document until `start`.
    pub fn new(host: Host, steps: Vec<Step>, options: WalkthroughOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                host,
                steps,
                options,
                state: RefCell::new(EngineState::default()),
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn steps(&self) -> &[Step] {
        &self.inner.steps
    }

    pub fn options(&self) -> &WalkthroughOptions {
        &self.inner.options
    }

    pub fn tour_id(&self) -> Option<&str> {
        self.inner.options.tour_id.as_deref()
    }

    /// Current step index, `None` before the first transition.
    pub fn current_index(&self) -> Option<usize> {
        self.inner.state.borrow().current
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.borrow().active
    }

    /// `true` once finished, skipped or destroyed.
    pub fn is_ended(&self) -> bool {
        self.inner.state.borrow().ended
    }

    /// Two handles drive the same instance.
    pub fn same_instance(&self, other: &Walkthrough) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Build the overlay, attach listeners and show the initial step.
    ///
    /// No-op when already active, ended, or when the host has no document.
    pub async fn start(&self, start_index: usize) {
        {
            let state = self.inner.state.borrow();
            if state.active || state.ended {
                return;
            }
        }

        let host = &self.inner.host;
        let options = &self.inner.options;
        if !host.surface.is_interactive() {
            log::debug!("Walkthrough start ignored: no interactive document");
            host.record(CATEGORY, "start-skipped", Some("no document"), None);
            return;
        }

        let handler = self.event_handler();
        let Some(overlay) = host
            .surface
            .create_overlay(&OverlayConfig::from(options), handler.clone())
        else {
            log::warn!("Walkthrough start ignored: host could not build the overlay");
            return;
        };
        if options.lock_scroll {
            host.surface.set_scroll_locked(true);
        }
        let listener = host.surface.listen(handler);

        {
            let mut state = self.inner.state.borrow_mut();
            state.active = true;
            state.overlay = Some(overlay);
            state.listener = Some(listener);
            state.scroll_locked = options.lock_scroll;
        }

        let initial = self.initial_index(start_index);
        log::debug!(
            "Starting walkthrough {:?} at step {initial}",
            options.tour_id
        );
        host.record(
            CATEGORY,
            "start",
            options.tour_id.as_deref(),
            Some(json!({ "index": initial, "steps": self.inner.steps.len() })),
        );

        self.go(initial as isize).await;
    }

    pub async fn next(&self) {
        let target = self.current_index().map_or(0, |i| i as isize + 1);
        self.go(target).await;
    }

    pub async fn prev(&self) {
        let target = self.current_index().map_or(-1, |i| i as isize - 1);
        self.go(target).await;
    }

    /// Transition to step `index`; an out-of-range index finishes the tour.
    pub async fn go(&self, index: isize) {
        let mut target = index;
        loop {
            if !self.is_active() {
                return;
            }
            let len = self.inner.steps.len() as isize;
            if target < 0 || target >= len {
                self.finish();
                return;
            }
            let i = target as usize;

            if let Some(prev) = self.current_index() {
                let hook = self.inner.steps.get(prev).and_then(|s| s.after_step.clone());
                if !self.run_hook(hook, "afterStep", prev).await {
                    return;
                }
                if !self.is_active() {
                    return;
                }
            }

            self.inner.state.borrow_mut().current = Some(i);
            if let Some(on_step_change) = self.inner.options.on_step_change.clone() {
                on_step_change(i);
            }
            if !self.is_active() {
                return;
            }

            let step = &self.inner.steps[i];
            if !self.run_hook(step.before_step.clone(), "beforeStep", i).await {
                return;
            }
            if !self.is_active() {
                return;
            }

            let element = self.resolve_element(step).await;
            if !self.is_active() {
                return;
            }

            match element {
                Some(element) => {
                    self.render_step(i, element);
                    return;
                }
                None if step.required => {
                    log::warn!("Required walkthrough step {i} missing: {}", step.selector);
                    self.inner.host.record(
                        CATEGORY,
                        "step-missing",
                        Some(&step.selector),
                        Some(json!({ "index": i, "required": true })),
                    );
                    self.skip(Some(&required_missing_reason(&step.selector)));
                    return;
                }
                None => {
                    log::debug!("Skipping walkthrough step {i}: {} not found", step.selector);
                    self.inner.host.record(
                        CATEGORY,
                        "step-missing",
                        Some(&step.selector),
                        Some(json!({ "index": i, "required": false })),
                    );
                    target = i as isize + 1;
                }
            }
        }
    }

    /// Mark the tour completed, tear down and call `on_finish`.
    pub fn finish(&self) {
        if !self.is_active() {
            return;
        }
        if let Some(tour_id) = self.inner.options.persistence_id() {
            let index = self.current_index().unwrap_or(0);
            progress::write_progress(
                self.inner.host.storage.as_ref(),
                tour_id,
                &ProgressRecord::new(index, true),
            );
        }
        self.teardown();
        self.inner
            .host
            .record(CATEGORY, "finish", self.tour_id(), None);
        if let Some(on_finish) = self.inner.options.on_finish.clone() {
            on_finish();
        }
    }

    /// Tear down without marking completion and call `on_skip(reason)`.
    pub fn skip(&self, reason: Option<&str>) {
        if !self.is_active() {
            return;
        }
        self.teardown();
        self.inner.host.record(
            CATEGORY,
            "skip",
            reason,
            Some(json!({ "tourId": self.tour_id(), "index": self.current_index() })),
        );
        if let Some(on_skip) = self.inner.options.on_skip.clone() {
            on_skip(reason.map(str::to_string));
        }
    }

    /// Tear down silently. Used when a tour is replaced or its host unmounts.
    pub fn destroy(&self) {
        let was_active = self.is_active();
        self.teardown();
        if was_active {
            self.inner
                .host
                .record(CATEGORY, "destroy", self.tour_id(), None);
        }
    }

    /// Remove the persisted record for this tour id.
    pub fn clear_progress(&self) {
        if let Some(tour_id) = self.tour_id() {
            progress::clear_progress(self.inner.host.storage.as_ref(), tour_id);
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn initial_index(&self, start_index: usize) -> usize {
        let options = &self.inner.options;
        if !options.resume {
            return start_index;
        }
        options
            .persistence_id()
            .and_then(|id| progress::read_progress(self.inner.host.storage.as_ref(), id))
            .and_then(|record| record.resume_index())
            .unwrap_or(start_index)
    }

    /// Run a step hook; on failure abort the tour and return `false`.
    async fn run_hook(&self, hook: Option<StepHook>, name: &str, index: usize) -> bool {
        let Some(hook) = hook else {
            return true;
        };
        match hook.call().await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Walkthrough {name} hook failed on step {index}: {e:#}");
                self.inner.host.record(
                    CATEGORY,
                    "hook-error",
                    Some(name),
                    Some(json!({ "index": index, "error": e.to_string() })),
                );
                self.skip(Some(&format!("Step hook failed: {name} on step {index}: {e}")));
                false
            }
        }
    }

    async fn resolve_element(&self, step: &Step) -> Option<Rc<dyn TargetElement>> {
        let surface = &self.inner.host.surface;
        let wait = self.inner.options.wait_for(step);
        if wait == 0 {
            return surface.query(&step.selector);
        }

        let interval = self.inner.options.poll_interval();
        let deadline = surface.now_ms() + wait as f64;
        loop {
            if let Some(element) = surface.query(&step.selector) {
                return Some(element);
            }
            if surface.now_ms() >= deadline {
                return None;
            }
            surface.sleep(interval).await;
            if !self.is_active() {
                return None;
            }
        }
    }

    fn render_step(&self, index: usize, element: Rc<dyn TargetElement>) {
        let inner = &self.inner;
        let step = &inner.steps[index];
        let options = &inner.options;

        let html = tooltip::render(&inner.steps, index, options);
        let announcement = tooltip::announcement(step, index, inner.steps.len());
        let stale_click = {
            let mut state = inner.state.borrow_mut();
            state.target = Some(element.clone());
            state.trap_armed = options.focus_trap;
            state.target_click.take()
        };
        drop(stale_click);

        if let Some(overlay) = inner.state.borrow().overlay.as_ref() {
            overlay.set_tooltip_html(&html);
            overlay.announce(&announcement);
        }
        self.reposition();

        if step.focus {
            element.focus();
        }
        if options.scroll_behavior != ScrollMode::None {
            element.scroll_into_view(options.scroll_behavior);
        }
        if options.advance_on_target_click {
            let click = element.on_click(self.event_handler());
            inner.state.borrow_mut().target_click = Some(click);
        }

        if let Some(tour_id) = options.persistence_id() {
            progress::write_progress(
                inner.host.storage.as_ref(),
                tour_id,
                &ProgressRecord::new(index, false),
            );
        }
        inner.host.record(
            CATEGORY,
            "step-resolved",
            Some(&step.selector),
            Some(json!({ "index": index })),
        );
    }

    /// Recompute highlight and tooltip geometry for the current step.
    pub fn reposition(&self) {
        let state = self.inner.state.borrow();
        if !state.active {
            return;
        }
        let (Some(overlay), Some(target), Some(index)) =
            (state.overlay.as_ref(), state.target.as_ref(), state.current)
        else {
            return;
        };
        let Some(rect) = target.rect() else {
            return;
        };
        let Some(step) = self.inner.steps.get(index) else {
            return;
        };

        let viewport = self.inner.host.surface.viewport();
        let frame = frame_around(rect, self.inner.options.padding_for(step), viewport);
        overlay.apply_frame(&frame);
        let position = place_tooltip(frame.ring, overlay.tooltip_size(), viewport);
        overlay.move_tooltip(&position);
    }

    /// The one teardown path shared by finish, skip and destroy.
    fn teardown(&self) {
        let (overlay, listener, target_click, scroll_locked) = {
            let mut state = self.inner.state.borrow_mut();
            state.active = false;
            state.ended = true;
            state.trap_armed = false;
            state.target = None;
            (
                state.overlay.take(),
                state.listener.take(),
                state.target_click.take(),
                std::mem::take(&mut state.scroll_locked),
            )
        };

        drop(target_click);
        drop(listener);
        if let Some(overlay) = overlay {
            overlay.remove();
        }
        if scroll_locked {
            self.inner.host.surface.set_scroll_locked(false);
        }
    }

    fn event_handler(&self) -> EventHandler {
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        Rc::new(move |event| match weak.upgrade() {
            Some(inner) => Walkthrough { inner }.handle_event(event),
            None => EventDisposition::Ignored,
        })
    }

    fn handle_event(&self, event: SurfaceEvent) -> EventDisposition {
        if !self.is_active() {
            return EventDisposition::Ignored;
        }
        match event {
            SurfaceEvent::Resize | SurfaceEvent::Scroll => {
                self.reposition();
                EventDisposition::Ignored
            }
            SurfaceEvent::Mutation => {
                self.reposition();
                if self.inner.options.always_on_top {
                    if let Some(overlay) = self.inner.state.borrow().overlay.as_ref() {
                        overlay.bring_to_front();
                    }
                }
                EventDisposition::Ignored
            }
            SurfaceEvent::Key(press) => self.handle_key(&press),
            SurfaceEvent::Action(TooltipAction::Next) => {
                self.spawn_navigation(KeyCommand::Next);
                EventDisposition::Handled
            }
            SurfaceEvent::Action(TooltipAction::Prev) => {
                self.spawn_navigation(KeyCommand::Prev);
                EventDisposition::Handled
            }
            SurfaceEvent::Action(TooltipAction::Skip) => {
                self.skip(Some("skip-button"));
                EventDisposition::Handled
            }
            SurfaceEvent::BackdropClick if self.inner.options.close_on_backdrop_click => {
                self.skip(Some("backdrop"));
                EventDisposition::Handled
            }
            SurfaceEvent::BackdropClick => EventDisposition::Ignored,
            SurfaceEvent::TargetClick if self.inner.options.advance_on_target_click => {
                self.spawn_navigation(KeyCommand::Next);
                EventDisposition::Ignored
            }
            SurfaceEvent::TargetClick => EventDisposition::Ignored,
        }
    }

    fn handle_key(&self, press: &KeyPress) -> EventDisposition {
        if press.is_tab() {
            return self.trap_focus(press.shift);
        }
        if !self.inner.options.keyboard {
            return EventDisposition::Ignored;
        }
        match command_for(&press.key) {
            Some(KeyCommand::Skip) => {
                self.skip(Some("esc"));
                EventDisposition::Handled
            }
            Some(command) => {
                self.spawn_navigation(command);
                EventDisposition::Handled
            }
            None => EventDisposition::Ignored,
        }
    }

    fn trap_focus(&self, backwards: bool) -> EventDisposition {
        let state = self.inner.state.borrow();
        if !state.trap_armed {
            return EventDisposition::Ignored;
        }
        let Some(overlay) = state.overlay.as_ref() else {
            return EventDisposition::Ignored;
        };
        match trap_target(overlay.focusable_count(), overlay.focused_index(), backwards) {
            Some(index) => {
                overlay.focus_at(index);
                EventDisposition::Handled
            }
            None => EventDisposition::Ignored,
        }
    }

    fn spawn_navigation(&self, command: KeyCommand) {
        let walkthrough = self.clone();
        let task = async move {
            match command {
                KeyCommand::Next => walkthrough.next().await,
                KeyCommand::Prev => walkthrough.prev().await,
                KeyCommand::Skip => walkthrough.skip(Some("esc")),
            }
        };
        self.inner.host.surface.spawn(task.boxed_local());
    }
}

impl std::fmt::Debug for Walkthrough {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walkthrough")
            .field("tour_id", &self.tour_id())
            .field("steps", &self.inner.steps.len())
            .field("current", &self.current_index())
            .field("active", &self.is_active())
            .finish()
    }
}
