//! Test Fixtures

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::geometry::Rect;
use crate::core::host::{Host, InMemoryHost};
use crate::core::options::WalkthroughOptions;
use crate::core::orchestrator::RegisteredTour;
use crate::core::step::Step;

// =============================================================================
// Host Fixtures
// =============================================================================

/// In-memory host with one element per selector, stacked vertically.
pub fn host_with_elements(selectors: &[&str]) -> InMemoryHost {
    let env = Host::in_memory();
    for (i, selector) in selectors.iter().enumerate() {
        env.surface.add_element(
            selector,
            Rect::new(40.0, 40.0 + i as f64 * 80.0, 120.0, 32.0),
        );
    }
    env
}

// =============================================================================
// Option Fixtures
// =============================================================================

/// Options that resolve elements with a single lookup.
pub fn zero_wait() -> WalkthroughOptions {
    WalkthroughOptions::default().with_wait(0, 10)
}

/// Zero-wait options persisting (and optionally resuming) under `tour_id`.
pub fn persisted(tour_id: &str, resume: bool) -> WalkthroughOptions {
    zero_wait()
        .with_tour_id(tour_id)
        .with_persistence(true, resume)
}

// =============================================================================
// Tour Fixtures
// =============================================================================

pub fn steps(selectors: &[&str]) -> Vec<Step> {
    selectors.iter().map(|s| Step::new(*s)).collect()
}

/// Auto tour on `matcher` with a single zero-wait step on `#a`.
pub fn auto_tour(id: &str, matcher: &str) -> RegisteredTour {
    RegisteredTour::new(id, matcher, steps(&["#a"])).with_options(zero_wait())
}

// =============================================================================
// Callback Recorders
// =============================================================================

/// Collects every value a callback is invoked with.
#[derive(Clone)]
pub struct Calls<T> {
    calls: Rc<RefCell<Vec<T>>>,
}

impl<T: Clone + 'static> Calls<T> {
    pub fn new() -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn push(&self, value: T) {
        self.calls.borrow_mut().push(value);
    }

    pub fn sink(&self) -> impl Fn(T) + 'static {
        let calls = self.calls.clone();
        move |value| calls.borrow_mut().push(value)
    }

    pub fn all(&self) -> Vec<T> {
        self.calls.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }
}
