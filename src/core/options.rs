//! Per-engine configuration and callbacks.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::step::Step;
use super::tooltip::{TooltipContext, TooltipRenderer};

/// Tooltip styling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Built-in `wt-*` classes with the bundled stylesheet.
    #[default]
    Default,
    /// Tailwind utility classes; no stylesheet injected.
    Tailwind,
    /// No classes at all.
    Unstyled,
}

/// How the target is scrolled into view when a step renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMode {
    #[default]
    Smooth,
    Instant,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonLabels {
    pub next: String,
    pub prev: String,
    pub done: String,
    pub skip: String,
}

impl Default for ButtonLabels {
    fn default() -> Self {
        Self {
            next: "Next".to_string(),
            prev: "Back".to_string(),
            done: "Done".to_string(),
            skip: "Skip".to_string(),
        }
    }
}

pub type StepChangeCallback = Rc<dyn Fn(usize)>;
pub type FinishCallback = Rc<dyn Fn()>;
pub type SkipCallback = Rc<dyn Fn(Option<String>)>;

/// Options for one engine instance. Every field has a default.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WalkthroughOptions {
    pub backdrop_opacity: f64,
    pub z_index: i32,
    /// Escape / arrow keys / Enter navigation.
    pub keyboard: bool,
    /// Lock `body` scrolling while the tour is active.
    pub lock_scroll: bool,
    /// Default element wait budget; `0` means a single lookup.
    pub wait_ms: i64,
    pub poll_interval_ms: i64,
    /// Default highlight padding in pixels.
    pub padding: f64,
    pub advance_on_target_click: bool,
    pub close_on_backdrop_click: bool,
    pub scroll_behavior: ScrollMode,
    pub persist_progress: bool,
    pub resume: bool,
    pub tour_id: Option<String>,
    pub theme: ThemeMode,
    pub focus_trap: bool,
    /// Keep the overlay the last child of `body`.
    pub always_on_top: bool,
    pub labels: ButtonLabels,
    #[serde(skip)]
    pub render_tooltip: Option<TooltipRenderer>,
    #[serde(skip)]
    pub on_step_change: Option<StepChangeCallback>,
    #[serde(skip)]
    pub on_finish: Option<FinishCallback>,
    #[serde(skip)]
    pub on_skip: Option<SkipCallback>,
}

impl Default for WalkthroughOptions {
    fn default() -> Self {
        Self {
            backdrop_opacity: 0.5,
            z_index: 10_000,
            keyboard: true,
            lock_scroll: true,
            wait_ms: 2_000,
            poll_interval_ms: 100,
            padding: 8.0,
            advance_on_target_click: false,
            close_on_backdrop_click: false,
            scroll_behavior: ScrollMode::Smooth,
            persist_progress: false,
            resume: false,
            tour_id: None,
            theme: ThemeMode::Default,
            focus_trap: true,
            always_on_top: true,
            labels: ButtonLabels::default(),
            render_tooltip: None,
            on_step_change: None,
            on_finish: None,
            on_skip: None,
        }
    }
}

impl WalkthroughOptions {
    /// Tour id used for persistence, or `None` when persistence is off.
    pub fn persistence_id(&self) -> Option<&str> {
        if self.persist_progress {
            self.tour_id.as_deref()
        } else {
            None
        }
    }

    /// Wait budget for `step` in milliseconds, clamped to zero.
    pub fn wait_for(&self, step: &Step) -> u64 {
        step.wait_ms.unwrap_or(self.wait_ms).max(0) as u64
    }

    /// Poll cadence in milliseconds, at least 1.
    pub fn poll_interval(&self) -> u64 {
        self.poll_interval_ms.max(1) as u64
    }

    pub fn padding_for(&self, step: &Step) -> f64 {
        step.padding.unwrap_or(self.padding)
    }

    pub fn with_tour_id(mut self, tour_id: impl Into<String>) -> Self {
        self.tour_id = Some(tour_id.into());
        self
    }

    pub fn with_persistence(mut self, persist: bool, resume: bool) -> Self {
        self.persist_progress = persist;
        self.resume = resume;
        self
    }

    pub fn with_wait(mut self, wait_ms: i64, poll_interval_ms: i64) -> Self {
        self.wait_ms = wait_ms;
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn with_theme(mut self, theme: ThemeMode) -> Self {
        self.theme = theme;
        self
    }

    pub fn on_step_change(mut self, callback: impl Fn(usize) + 'static) -> Self {
        self.on_step_change = Some(Rc::new(callback));
        self
    }

    pub fn on_finish(mut self, callback: impl Fn() + 'static) -> Self {
        self.on_finish = Some(Rc::new(callback));
        self
    }

    pub fn on_skip(mut self, callback: impl Fn(Option<String>) + 'static) -> Self {
        self.on_skip = Some(Rc::new(callback));
        self
    }

    pub fn render_tooltip(
        mut self,
        renderer: impl Fn(&TooltipContext<'_>) -> String + 'static,
    ) -> Self {
        self.render_tooltip = Some(Rc::new(renderer));
        self
    }

    /// These options with every field still at its default taken from `base`.
    ///
    /// Labels merge per label. `tour_id` and the callbacks always come from
    /// `self`.
    pub fn layered_over(self, base: &WalkthroughOptions) -> WalkthroughOptions {
        match layer_fields(&self, base) {
            Ok(layered) => WalkthroughOptions {
                tour_id: self.tour_id,
                render_tooltip: self.render_tooltip,
                on_step_change: self.on_step_change,
                on_finish: self.on_finish,
                on_skip: self.on_skip,
                ..layered
            },
            Err(e) => {
                log::warn!("Could not layer walkthrough options, keeping them as given: {e}");
                self
            }
        }
    }
}

fn layer_fields(
    own: &WalkthroughOptions,
    base: &WalkthroughOptions,
) -> serde_json::Result<WalkthroughOptions> {
    let mut layered = serde_json::to_value(own)?;
    let defaults = serde_json::to_value(WalkthroughOptions::default())?;
    let base = serde_json::to_value(base)?;
    fill_defaults(&mut layered, &defaults, &base);
    serde_json::from_value(layered)
}

fn fill_defaults(own: &mut Value, defaults: &Value, base: &Value) {
    let (Value::Object(own), Value::Object(defaults), Value::Object(base)) = (own, defaults, base)
    else {
        return;
    };
    for (key, value) in own.iter_mut() {
        let (Some(default), Some(layer)) = (defaults.get(key), base.get(key)) else {
            continue;
        };
        if value.is_object() {
            fill_defaults(value, default, layer);
        } else if value == default {
            *value = layer.clone();
        }
    }
}

impl std::fmt::Debug for WalkthroughOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkthroughOptions")
            .field("tour_id", &self.tour_id)
            .field("persist_progress", &self.persist_progress)
            .field("resume", &self.resume)
            .field("wait_ms", &self.wait_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("theme", &self.theme)
            .field("keyboard", &self.keyboard)
            .field("focus_trap", &self.focus_trap)
            .field("custom_renderer", &self.render_tooltip.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = WalkthroughOptions::default();
        assert!(options.keyboard);
        assert!(options.lock_scroll);
        assert!(options.focus_trap);
        assert!(options.always_on_top);
        assert_eq!(options.theme, ThemeMode::Default);
        assert_eq!(options.persistence_id(), None);
    }

    #[test]
    fn test_persistence_requires_tour_id() {
        let options = WalkthroughOptions::default().with_persistence(true, true);
        assert_eq!(options.persistence_id(), None);

        let options = options.with_tour_id("intro");
        assert_eq!(options.persistence_id(), Some("intro"));

        let options = options.with_persistence(false, true);
        assert_eq!(options.persistence_id(), None);
    }

    #[test]
    fn test_layered_over_fills_every_default_field() {
        let mut base = WalkthroughOptions::default()
            .with_wait(50, 5)
            .with_theme(ThemeMode::Unstyled)
            .with_persistence(true, true)
            .with_tour_id("from-config");
        base.keyboard = false;
        base.padding = 2.0;
        base.close_on_backdrop_click = true;
        base.labels.done = "Finish".into();

        let mut own = WalkthroughOptions::default().with_tour_id("tour").on_finish(|| {});
        own.padding = 12.0;
        own.labels.next = "Onward".into();

        let layered = own.layered_over(&base);
        assert_eq!(layered.wait_ms, 50);
        assert_eq!(layered.poll_interval_ms, 5);
        assert_eq!(layered.theme, ThemeMode::Unstyled);
        assert!(layered.persist_progress);
        assert!(layered.resume);
        assert!(!layered.keyboard);
        assert!(layered.close_on_backdrop_click);
        assert_eq!(layered.padding, 12.0);
        assert_eq!(layered.labels.next, "Onward");
        assert_eq!(layered.labels.done, "Finish");
        assert_eq!(layered.tour_id.as_deref(), Some("tour"));
        assert!(layered.on_finish.is_some());
    }

    #[test]
    fn test_wait_clamping() {
        let options = WalkthroughOptions::default().with_wait(500, 0);
        assert_eq!(options.wait_for(&Step::new("#a")), 500);
        assert_eq!(options.wait_for(&Step::new("#a").wait_ms(-20)), 0);
        assert_eq!(options.wait_for(&Step::new("#a").wait_ms(50)), 50);
        assert_eq!(options.poll_interval(), 1);
    }

    #[test]
    fn test_options_from_json() {
        let options: WalkthroughOptions = serde_json::from_str(
            r#"{"persistProgress":true,"tourId":"intro","theme":"tailwind","scrollBehavior":"none","labels":{"next":"Weiter"}}"#,
        )
        .unwrap();
        assert_eq!(options.persistence_id(), Some("intro"));
        assert_eq!(options.theme, ThemeMode::Tailwind);
        assert_eq!(options.scroll_behavior, ScrollMode::None);
        assert_eq!(options.labels.next, "Weiter");
        assert_eq!(options.labels.done, "Done");
        assert_eq!(options.padding, 8.0);
    }
}
