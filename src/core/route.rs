//! Route-driven tour running and the owned "current tour" slot.
//!
//! `RouteTours` is what a UI binding calls on every location change. It tears
//! down whatever the previous route started, optionally loads a tour module,
//! asks the orchestrator for matches and keeps the handles it got back.
//! A generation counter discards results of navigations that were superseded
//! or disposed while they awaited.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::chain::TourChain;
use super::engine::{start_walkthrough, Walkthrough};
use super::host::Host;
use super::options::WalkthroughOptions;
use super::orchestrator::{TourLoader, TourOrchestrator};
use super::step::Step;

const CATEGORY: &str = "route";

/// How matched tours are started on navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteMode {
    /// Every eligible tour at once.
    Concurrent,
    /// Eligible tours one after another, by `order`.
    #[default]
    Chained,
    /// Only the first eligible tour.
    FirstOnly,
}

#[derive(Default)]
enum Running {
    #[default]
    Idle,
    Tours(Vec<Walkthrough>),
    Chain(TourChain),
}

impl Running {
    fn tear_down(self) {
        match self {
            Running::Idle => {}
            Running::Tours(walkthroughs) => walkthroughs.iter().for_each(Walkthrough::destroy),
            Running::Chain(chain) => chain.destroy(),
        }
    }
}

struct RouteInner {
    orchestrator: TourOrchestrator,
    loader: Option<(TourLoader, String)>,
    mode: RouteMode,
    running: RefCell<Running>,
    generation: Cell<u64>,
    disposed: Cell<bool>,
}

/// Starts matching tours as the current route changes.
#[derive(Clone)]
pub struct RouteTours {
    inner: Rc<RouteInner>,
}

impl RouteTours {
    pub fn new(orchestrator: TourOrchestrator, mode: RouteMode) -> Self {
        Self::build(orchestrator, mode, None)
    }

    /// Load tours from `specifier` through `loader` before every match.
    pub fn with_loader(
        orchestrator: TourOrchestrator,
        mode: RouteMode,
        loader: TourLoader,
        specifier: impl Into<String>,
    ) -> Self {
        Self::build(orchestrator, mode, Some((loader, specifier.into())))
    }

    fn build(
        orchestrator: TourOrchestrator,
        mode: RouteMode,
        loader: Option<(TourLoader, String)>,
    ) -> Self {
        Self {
            inner: Rc::new(RouteInner {
                orchestrator,
                loader,
                mode,
                running: RefCell::new(Running::Idle),
                generation: Cell::new(0),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn orchestrator(&self) -> &TourOrchestrator {
        &self.inner.orchestrator
    }

    pub fn mode(&self) -> RouteMode {
        self.inner.mode
    }

    /// Walkthroughs started for the current route. A chain contributes its
    /// running tour.
    pub fn running(&self) -> Vec<Walkthrough> {
        match &*self.inner.running.borrow() {
            Running::Idle => Vec::new(),
            Running::Tours(walkthroughs) => walkthroughs.clone(),
            Running::Chain(chain) => chain.current().into_iter().collect(),
        }
    }

    pub fn chain(&self) -> Option<TourChain> {
        match &*self.inner.running.borrow() {
            Running::Chain(chain) => Some(chain.clone()),
            _ => None,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Tear down the previous route's tours and start the ones matching
    /// `pathname`. Returns the ids started, empty when superseded.
    pub async fn navigate(&self, pathname: &str) -> Vec<String> {
        if self.inner.disposed.get() {
            return Vec::new();
        }
        self.tear_down();
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);

        let host = self.inner.orchestrator.host().clone();
        host.record(CATEGORY, "navigate", Some(pathname), None);

        if let Some((loader, specifier)) = &self.inner.loader {
            if let Err(e) = self.inner.orchestrator.load_tours(loader, specifier).await {
                log::warn!("Route tours could not be loaded: {e}");
                host.record(CATEGORY, "load-error", Some(specifier), None);
            }
            if self.is_stale(generation) {
                return Vec::new();
            }
        }

        let orchestrator = &self.inner.orchestrator;
        let (ids, running) = match self.inner.mode {
            RouteMode::Concurrent | RouteMode::FirstOnly => {
                let first_only = self.inner.mode == RouteMode::FirstOnly;
                let started = orchestrator.start_auto_matches(pathname, first_only).await;
                (started.ids, Running::Tours(started.walkthroughs))
            }
            RouteMode::Chained => {
                let result = orchestrator.chain_auto_matches(pathname).await;
                let running = result.chain.map_or(Running::Idle, Running::Chain);
                (result.ids, running)
            }
        };

        if self.is_stale(generation) {
            log::debug!("Discarding tours for superseded route {pathname}");
            host.record(CATEGORY, "discard", Some(pathname), None);
            running.tear_down();
            return Vec::new();
        }
        *self.inner.running.borrow_mut() = running;
        ids
    }

    /// Tear down running tours and ignore any navigation still in flight.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.tear_down();
        self.inner
            .orchestrator
            .host()
            .record(CATEGORY, "dispose", None, None);
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.inner.disposed.get() || self.inner.generation.get() != generation
    }

    fn tear_down(&self) {
        let previous = std::mem::take(&mut *self.inner.running.borrow_mut());
        previous.tear_down();
    }
}

impl std::fmt::Debug for RouteTours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTours")
            .field("mode", &self.inner.mode)
            .field("generation", &self.inner.generation.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

// ============================================================================
// Slot
// ============================================================================

/// Owned, nullable handle to the one walkthrough a UI surface shows.
///
/// Putting a new instance in the slot destroys the previous one first.
#[derive(Clone, Default)]
pub struct TourSlot {
    current: Rc<RefCell<Option<Walkthrough>>>,
}

impl TourSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Walkthrough> {
        self.current.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some_and(|wt| wt.is_active())
    }

    /// Store `walkthrough`, destroying whatever was there.
    pub fn replace(&self, walkthrough: Walkthrough) {
        let previous = self.current.borrow_mut().replace(walkthrough);
        if let Some(previous) = previous {
            previous.destroy();
        }
    }

    /// Start a new walkthrough in the slot.
    pub fn start(&self, host: Host, steps: Vec<Step>, options: WalkthroughOptions) -> Walkthrough {
        self.clear();
        let walkthrough = start_walkthrough(host, steps, options);
        self.replace(walkthrough.clone());
        walkthrough
    }

    /// Destroy and forget the current walkthrough.
    pub fn clear(&self) {
        let previous = self.current.borrow_mut().take();
        if let Some(previous) = previous {
            previous.destroy();
        }
    }
}

impl std::fmt::Debug for TourSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourSlot").field("current", &self.current()).finish()
    }
}
