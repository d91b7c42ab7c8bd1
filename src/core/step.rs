//! Tour steps and their async hooks.

use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use serde::{Deserialize, Serialize};

/// Async callback run before or after a step is shown.
///
/// Hooks are caller code; an `Err` aborts the tour with a skip whose reason
/// names the hook.
#[derive(Clone)]
pub struct StepHook(Rc<dyn Fn() -> LocalBoxFuture<'static, anyhow::Result<()>>>);

impl StepHook {
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self(Rc::new(move || hook().boxed_local()))
    }

    /// Hook that runs synchronously and always succeeds.
    pub fn sync(hook: impl Fn() + 'static) -> Self {
        Self::new(move || {
            hook();
            futures::future::ready(Ok(()))
        })
    }

    pub fn call(&self) -> LocalBoxFuture<'static, anyhow::Result<()>> {
        (self.0)()
    }
}

impl std::fmt::Debug for StepHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StepHook")
    }
}

/// One spotlighted element within a tour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Step {
    /// CSS selector of the element to highlight.
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// HTML body, sanitized before insertion unless `allow_unsafe_html`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Overrides the engine's default padding around the highlight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
    /// Move keyboard focus to the target when the step renders.
    pub focus: bool,
    #[serde(skip)]
    pub before_step: Option<StepHook>,
    #[serde(skip)]
    pub after_step: Option<StepHook>,
    /// Overrides the engine's element wait budget. Negative values count as 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<i64>,
    /// Abort the tour instead of skipping the step when the element is missing.
    pub required: bool,
    #[serde(rename = "allowUnsafeHTML")]
    pub allow_unsafe_html: bool,
}

impl Step {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, html: impl Into<String>) -> Self {
        self.content = Some(html.into());
        self
    }

    pub fn padding(mut self, padding: f64) -> Self {
        self.padding = Some(padding);
        self
    }

    pub fn focus(mut self, focus: bool) -> Self {
        self.focus = focus;
        self
    }

    pub fn wait_ms(mut self, wait_ms: i64) -> Self {
        self.wait_ms = Some(wait_ms);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn allow_unsafe_html(mut self, allow: bool) -> Self {
        self.allow_unsafe_html = allow;
        self
    }

    pub fn before(mut self, hook: StepHook) -> Self {
        self.before_step = Some(hook);
        self
    }

    pub fn after(mut self, hook: StepHook) -> Self {
        self.after_step = Some(hook);
        self
    }
}
