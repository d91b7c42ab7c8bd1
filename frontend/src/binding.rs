//! Leptos bindings: a context-provided walkthrough handle and a route hook.
//!
//! Non-`Send` engine handles live in local stored values; components only
//! see `Copy` handles and reactive signals.

use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_location;

use walkthrough::{
    DebugSnapshot, Host, RouteMode, RouteTours, Step, TourLoader, TourOrchestrator, TourSlot,
    Walkthrough, WalkthroughOptions,
};

use crate::host::web_host;

// ============================================================================
// Walkthrough State
// ============================================================================

/// Reactive handle to the page's single "current" walkthrough.
#[derive(Clone, Copy)]
pub struct WalkthroughState {
    host: StoredValue<Host, LocalStorage>,
    slot: StoredValue<TourSlot, LocalStorage>,
    /// Index of the rendered step while a tour runs.
    pub current_step: RwSignal<Option<usize>>,
    pub active: RwSignal<bool>,
    /// Reason passed to `on_skip` by the last skipped tour.
    pub last_skip: RwSignal<Option<String>>,
}

impl WalkthroughState {
    pub fn new(host: Host) -> Self {
        Self {
            host: StoredValue::new_local(host),
            slot: StoredValue::new_local(TourSlot::new()),
            current_step: RwSignal::new(None),
            active: RwSignal::new(false),
            last_skip: RwSignal::new(None),
        }
    }

    pub fn host(&self) -> Option<Host> {
        self.host.try_get_value()
    }

    /// The running walkthrough, if any.
    pub fn current(&self) -> Option<Walkthrough> {
        self.slot.try_get_value().and_then(|slot| slot.current())
    }

    /// Start a tour, destroying the one already running.
    ///
    /// `active` turns on with the first rendered step, so it stays off on a
    /// host that cannot show tours.
    pub fn start(&self, steps: Vec<Step>, options: WalkthroughOptions) -> Option<Walkthrough> {
        let host = self.host()?;
        let slot = self.slot.try_get_value()?;
        let options = self.track(options);
        self.reset();
        self.last_skip.set(None);
        Some(slot.start(host, steps, options))
    }

    /// Destroy the running tour without firing its callbacks.
    pub fn stop(&self) {
        if let Some(slot) = self.slot.try_get_value() {
            slot.clear();
        }
        self.reset();
    }

    pub fn next(&self) {
        if let Some(walkthrough) = self.current() {
            spawn_local(async move { walkthrough.next().await });
        }
    }

    pub fn prev(&self) {
        if let Some(walkthrough) = self.current() {
            spawn_local(async move { walkthrough.prev().await });
        }
    }

    pub fn debug_snapshot(&self) -> Option<DebugSnapshot> {
        self.host().map(|host| host.debug.snapshot())
    }

    fn reset(&self) {
        let _ = self.active.try_set(false);
        let _ = self.current_step.try_set(None);
    }

    /// Mirror lifecycle callbacks into the signals, then call the caller's.
    fn track(&self, options: WalkthroughOptions) -> WalkthroughOptions {
        let state = *self;
        let on_change = options.on_step_change.clone();
        let on_finish = options.on_finish.clone();
        let on_skip = options.on_skip.clone();

        options
            .on_step_change(move |index| {
                let _ = state.current_step.try_set(Some(index));
                if state.active.try_get_untracked() == Some(false) {
                    let _ = state.active.try_set(true);
                }
                if let Some(callback) = &on_change {
                    callback(index);
                }
            })
            .on_finish(move || {
                state.reset();
                if let Some(callback) = &on_finish {
                    callback();
                }
            })
            .on_skip(move |reason| {
                state.reset();
                let _ = state.last_skip.try_set(reason.clone());
                if let Some(callback) = &on_skip {
                    callback(reason);
                }
            })
    }
}

// Global accessor helpers
pub fn provide_walkthrough() -> WalkthroughState {
    provide_walkthrough_with(web_host())
}

pub fn provide_walkthrough_with(host: Host) -> WalkthroughState {
    let state = WalkthroughState::new(host);
    provide_context(state);
    on_cleanup(move || state.stop());
    state
}

pub fn use_walkthrough() -> WalkthroughState {
    expect_context::<WalkthroughState>()
}

// ============================================================================
// Route Tours
// ============================================================================

/// Start registered tours whenever the router location changes.
///
/// `register` fills the orchestrator once. Must be called under a `<Router>`
/// and after [`provide_walkthrough`].
pub fn use_route_tours(
    mode: RouteMode,
    register: impl FnOnce(&TourOrchestrator),
) -> StoredValue<RouteTours, LocalStorage> {
    let orchestrator = route_orchestrator();
    register(&orchestrator);
    watch_location(RouteTours::new(orchestrator, mode))
}

/// Like [`use_route_tours`], but tours come from `loader` on every navigation.
pub fn use_loaded_route_tours(
    mode: RouteMode,
    loader: TourLoader,
    specifier: impl Into<String>,
) -> StoredValue<RouteTours, LocalStorage> {
    let orchestrator = route_orchestrator();
    watch_location(RouteTours::with_loader(orchestrator, mode, loader, specifier))
}

fn route_orchestrator() -> TourOrchestrator {
    let host = use_context::<WalkthroughState>()
        .and_then(|state| state.host())
        .unwrap_or_else(web_host);
    TourOrchestrator::new(host)
}

fn watch_location(routes: RouteTours) -> StoredValue<RouteTours, LocalStorage> {
    let routes = StoredValue::new_local(routes);
    let location = use_location();

    Effect::new(move |_| {
        let pathname = location.pathname.get();
        let Some(runner) = routes.try_get_value() else {
            return;
        };
        spawn_local(async move {
            let started = runner.navigate(&pathname).await;
            if !started.is_empty() {
                log::debug!("Started tours on {}: {:?}", pathname, started);
            }
        });
    });

    on_cleanup(move || {
        if let Some(runner) = routes.try_get_value() {
            runner.dispose();
        }
    });

    routes
}
