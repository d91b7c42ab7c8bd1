//! Tooltip markup.
//!
//! The engine renders tooltip content to an HTML string; hosts insert it into
//! the tooltip container and route clicks on `data-walkthrough-action`
//! buttons back to the engine.

use std::rc::Rc;

use super::options::{ButtonLabels, ThemeMode, WalkthroughOptions};
use super::sanitize::{escape_html, sanitize};
use super::step::Step;

/// Attribute carrying a tooltip button's action.
pub const ACTION_ATTRIBUTE: &str = "data-walkthrough-action";

/// Custom tooltip renderer. Its output is inserted as-is.
pub type TooltipRenderer = Rc<dyn Fn(&TooltipContext<'_>) -> String>;

/// Everything a renderer needs to draw one step.
#[derive(Debug)]
pub struct TooltipContext<'a> {
    pub step: &'a Step,
    pub index: usize,
    pub total: usize,
    /// Step content after sanitization (or verbatim with `allow_unsafe_html`).
    pub content_html: String,
    pub labels: &'a ButtonLabels,
    pub theme: ThemeMode,
}

impl TooltipContext<'_> {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.total
    }
}

/// Tooltip button actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TooltipAction {
    Next,
    Prev,
    Skip,
}

impl TooltipAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TooltipAction::Next => "next",
            TooltipAction::Prev => "prev",
            TooltipAction::Skip => "skip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "next" => Some(TooltipAction::Next),
            "prev" => Some(TooltipAction::Prev),
            "skip" => Some(TooltipAction::Skip),
            _ => None,
        }
    }
}

struct ThemeClasses {
    root: &'static str,
    title: &'static str,
    body: &'static str,
    footer: &'static str,
    progress: &'static str,
    button: &'static str,
    primary: &'static str,
}

impl ThemeClasses {
    fn for_theme(theme: ThemeMode) -> Self {
        match theme {
            ThemeMode::Default => Self {
                root: "wt-tooltip-inner",
                title: "wt-title",
                body: "wt-body",
                footer: "wt-footer",
                progress: "wt-progress",
                button: "wt-btn",
                primary: "wt-btn wt-btn-primary",
            },
            ThemeMode::Tailwind => Self {
                root: "max-w-sm rounded-lg bg-white p-4 text-zinc-900 shadow-xl",
                title: "mb-1 text-base font-semibold",
                body: "text-sm leading-relaxed text-zinc-600",
                footer: "mt-3 flex items-center justify-between gap-2",
                progress: "text-xs text-zinc-400",
                button: "rounded px-3 py-1 text-sm text-zinc-600 hover:bg-zinc-100",
                primary: "rounded bg-indigo-600 px-3 py-1 text-sm text-white hover:bg-indigo-500",
            },
            ThemeMode::Unstyled => Self {
                root: "",
                title: "",
                body: "",
                footer: "",
                progress: "",
                button: "",
                primary: "",
            },
        }
    }
}

/// Render the tooltip for step `index` of `steps`.
pub fn render(steps: &[Step], index: usize, options: &WalkthroughOptions) -> String {
    let Some(step) = steps.get(index) else {
        return String::new();
    };
    let content_html = match &step.content {
        Some(html) if step.allow_unsafe_html => html.clone(),
        Some(html) => sanitize(html),
        None => String::new(),
    };
    let ctx = TooltipContext {
        step,
        index,
        total: steps.len(),
        content_html,
        labels: &options.labels,
        theme: options.theme,
    };

    match &options.render_tooltip {
        Some(renderer) => renderer(&ctx),
        None => default_markup(&ctx),
    }
}

/// Text announced to assistive technology when a step renders.
pub fn announcement(step: &Step, index: usize, total: usize) -> String {
    match &step.title {
        Some(title) => format!("Step {} of {}: {}", index + 1, total, title),
        None => format!("Step {} of {}", index + 1, total),
    }
}

fn class_attr(class: &str) -> String {
    if class.is_empty() {
        String::new()
    } else {
        format!(r#" class="{class}""#)
    }
}

fn button(class: &str, action: TooltipAction, label: &str) -> String {
    format!(
        r#"<button type="button"{} {ACTION_ATTRIBUTE}="{}">{}</button>"#,
        class_attr(class),
        action.as_str(),
        escape_html(label)
    )
}

fn default_markup(ctx: &TooltipContext<'_>) -> String {
    let classes = ThemeClasses::for_theme(ctx.theme);
    let title_id = format!("wt-title-{}", ctx.index);
    let mut html = String::new();

    html.push_str(&format!(
        r#"<div{} role="dialog" aria-modal="true""#,
        class_attr(classes.root)
    ));
    if ctx.step.title.is_some() {
        html.push_str(&format!(r#" aria-labelledby="{title_id}""#));
    }
    html.push('>');

    if let Some(title) = &ctx.step.title {
        html.push_str(&format!(
            r#"<h2 id="{title_id}"{}>{}</h2>"#,
            class_attr(classes.title),
            escape_html(title)
        ));
    }
    if !ctx.content_html.is_empty() {
        html.push_str(&format!(
            "<div{}>{}</div>",
            class_attr(classes.body),
            ctx.content_html
        ));
    }

    html.push_str(&format!("<div{}>", class_attr(classes.footer)));
    html.push_str(&format!(
        "<span{}>{} / {}</span><div>",
        class_attr(classes.progress),
        ctx.index + 1,
        ctx.total
    ));
    if !ctx.is_first() {
        html.push_str(&button(classes.button, TooltipAction::Prev, &ctx.labels.prev));
    }
    html.push_str(&button(classes.button, TooltipAction::Skip, &ctx.labels.skip));
    let next_label = if ctx.is_last() {
        &ctx.labels.done
    } else {
        &ctx.labels.next
    };
    html.push_str(&button(classes.primary, TooltipAction::Next, next_label));
    html.push_str("</div></div></div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps() -> Vec<Step> {
        vec![
            Step::new("#a").title("First"),
            Step::new("#b").content(r#"<p onclick="x">Hi<script>y</script></p>"#),
            Step::new("#c")
                .title("<Last>")
                .content(r#"<p onclick="x">Hi<script>y</script></p>"#)
                .allow_unsafe_html(true),
        ]
    }

    #[test]
    fn test_content_is_sanitized() {
        let html = render(&steps(), 1, &WalkthroughOptions::default());
        assert!(html.contains("<p>Hi</p>"));
        assert!(!html.contains("script"));
        assert!(!html.contains("onclick"));
    }

    #[test]
    fn test_unsafe_content_passes_verbatim() {
        let html = render(&steps(), 2, &WalkthroughOptions::default());
        assert!(html.contains(r#"<p onclick="x">Hi<script>y</script></p>"#));
        assert!(html.contains("&lt;Last&gt;"));
    }

    #[test]
    fn test_buttons_follow_position() {
        let options = WalkthroughOptions::default();
        let first = render(&steps(), 0, &options);
        assert!(!first.contains(r#"data-walkthrough-action="prev""#));
        assert!(first.contains(">Next</button>"));
        assert!(first.contains("1 / 3"));
        assert!(first.contains(r#"aria-labelledby="wt-title-0""#));

        let last = render(&steps(), 2, &options);
        assert!(last.contains(r#"data-walkthrough-action="prev""#));
        assert!(last.contains(">Done</button>"));
    }

    #[test]
    fn test_unstyled_theme_has_no_classes() {
        let options = WalkthroughOptions::default().with_theme(ThemeMode::Unstyled);
        let html = render(&steps(), 0, &options);
        assert!(!html.contains("class="));
    }

    #[test]
    fn test_custom_renderer() {
        let options = WalkthroughOptions::default()
            .render_tooltip(|ctx| format!("<em>{} of {}</em>", ctx.index + 1, ctx.total));
        assert_eq!(render(&steps(), 1, &options), "<em>2 of 3</em>");
    }

    #[test]
    fn test_announcement() {
        let steps = steps();
        assert_eq!(announcement(&steps[0], 0, 3), "Step 1 of 3: First");
        assert_eq!(announcement(&steps[1], 1, 3), "Step 2 of 3");
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(TooltipAction::parse("next"), Some(TooltipAction::Next));
        assert_eq!(TooltipAction::parse("close"), None);
    }
}
