//! Bundled stylesheet for the `default` theme.

use web_sys::Document;

pub const STYLE_ELEMENT_ID: &str = "walkthrough-default-styles";

/// Inline styles for the offscreen live region.
pub const VISUALLY_HIDDEN: [(&str, &str); 7] = [
    ("position", "absolute"),
    ("width", "1px"),
    ("height", "1px"),
    ("overflow", "hidden"),
    ("clip", "rect(0 0 0 0)"),
    ("white-space", "nowrap"),
    ("margin", "-1px"),
];

pub const DEFAULT_CSS: &str = r#"
.wt-ring {
    border-radius: 6px;
    box-shadow: 0 0 0 2px rgba(99, 102, 241, 0.9), 0 0 0 6px rgba(99, 102, 241, 0.25);
    transition: left 120ms ease, top 120ms ease, width 120ms ease, height 120ms ease;
}
.wt-backdrop {
    transition: all 120ms ease;
}
.wt-tooltip {
    max-width: 320px;
}
.wt-tooltip-inner {
    background: #ffffff;
    color: #18181b;
    border-radius: 8px;
    padding: 14px 16px;
    box-shadow: 0 10px 30px rgba(0, 0, 0, 0.25);
    font: 14px/1.5 system-ui, -apple-system, "Segoe UI", sans-serif;
}
.wt-title {
    margin: 0 0 4px;
    font-size: 15px;
    font-weight: 600;
}
.wt-body {
    color: #52525b;
}
.wt-footer {
    display: flex;
    align-items: center;
    justify-content: space-between;
    gap: 8px;
    margin-top: 12px;
}
.wt-progress {
    color: #a1a1aa;
    font-size: 12px;
}
.wt-btn {
    border: 0;
    border-radius: 4px;
    padding: 4px 10px;
    margin-left: 4px;
    background: transparent;
    color: #52525b;
    cursor: pointer;
}
.wt-btn:hover {
    background: #f4f4f5;
}
.wt-btn-primary {
    background: #4f46e5;
    color: #ffffff;
}
.wt-btn-primary:hover {
    background: #6366f1;
}
.wt-btn:focus-visible {
    outline: 2px solid #6366f1;
    outline-offset: 2px;
}
"#;

/// Add the default stylesheet to `head` once per document.
pub fn inject_default_styles(document: &Document) {
    if document.get_element_by_id(STYLE_ELEMENT_ID).is_some() {
        return;
    }
    let Some(head) = document.head() else {
        return;
    };
    match document.create_element("style") {
        Ok(style) => {
            style.set_id(STYLE_ELEMENT_ID);
            style.set_text_content(Some(DEFAULT_CSS));
            if let Err(e) = head.append_child(&style) {
                log::warn!("Failed to inject walkthrough styles: {:?}", e);
            }
        }
        Err(e) => log::warn!("Failed to create style element: {:?}", e),
    }
}
