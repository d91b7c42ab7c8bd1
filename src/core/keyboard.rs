//! Keyboard navigation and the tooltip focus trap.

/// Selector for elements the focus trap cycles through.
pub const FOCUSABLE_SELECTOR: &str = "a[href], button:not([disabled]), \
     textarea:not([disabled]), input[type=\"text\"]:not([disabled]), \
     input[type=\"radio\"]:not([disabled]), input[type=\"checkbox\"]:not([disabled]), \
     select:not([disabled]), [tabindex]:not([tabindex=\"-1\"])";

/// A key press as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub shift: bool,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            shift: false,
        }
    }

    pub fn with_shift(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            shift: true,
        }
    }

    pub fn is_tab(&self) -> bool {
        self.key == "Tab"
    }
}

/// Navigation command bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Skip,
    Next,
    Prev,
}

/// Map a `KeyboardEvent.key` value to a navigation command.
pub fn command_for(key: &str) -> Option<KeyCommand> {
    match key {
        "Escape" => Some(KeyCommand::Skip),
        "ArrowRight" | "Enter" => Some(KeyCommand::Next),
        "ArrowLeft" => Some(KeyCommand::Prev),
        _ => None,
    }
}

/// Where Tab should move focus inside a trap of `count` focusable elements.
///
/// Returns `None` when the browser's default Tab order already keeps focus
/// inside the trap; `Some(index)` when focus must wrap or be pulled back in.
pub fn trap_target(count: usize, focused: Option<usize>, backwards: bool) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let last = count - 1;
    match (focused, backwards) {
        (None, false) => Some(0),
        (None, true) => Some(last),
        (Some(0), true) => Some(last),
        (Some(i), false) if i >= last => Some(0),
        _ => None,
    }
}
