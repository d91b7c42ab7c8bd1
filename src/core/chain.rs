//! Tour Chain
//!
//! Runs an ordered list of tours one after another. A tour finishing starts
//! the next; a tour being skipped halts the chain. Entries whose persisted
//! record is already completed are passed over.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::future::FutureExt;
use serde_json::json;

use super::engine::Walkthrough;
use super::host::Host;
use super::options::WalkthroughOptions;
use super::progress;
use super::step::Step;
use super::storage::KeyValueStore;

const CATEGORY: &str = "chain";

/// Skip reason passed to the running tour when the chain is stopped.
pub const CHAIN_STOP_REASON: &str = "chain-stop";

/// One tour in a chain.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub id: String,
    pub steps: Vec<Step>,
    pub options: WalkthroughOptions,
}

impl ChainEntry {
    pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            steps,
            options: WalkthroughOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WalkthroughOptions) -> Self {
        self.options = options;
        self
    }

    /// Id the entry persists under: the explicit `tour_id` option, else `id`.
    pub fn tour_id(&self) -> &str {
        self.options.tour_id.as_deref().unwrap_or(&self.id)
    }

    /// Completed records only count for entries that persist progress.
    fn is_completed(&self, storage: &dyn KeyValueStore) -> bool {
        self.options.persist_progress && progress::is_completed(storage, self.tour_id())
    }
}

struct ChainInner {
    host: Host,
    entries: Vec<ChainEntry>,
    cursor: Cell<Option<usize>>,
    current: RefCell<Option<Walkthrough>>,
    halted: Cell<bool>,
}

/// Sequential runner over [`ChainEntry`] values.
#[derive(Clone)]
pub struct TourChain {
    inner: Rc<ChainInner>,
}

impl TourChain {
    pub fn new(host: Host, entries: Vec<ChainEntry>) -> Self {
        Self {
            inner: Rc::new(ChainInner {
                host,
                entries,
                cursor: Cell::new(None),
                current: RefCell::new(None),
                halted: Cell::new(false),
            }),
        }
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.inner.entries
    }

    /// Index of the entry currently running, if any.
    pub fn cursor(&self) -> Option<usize> {
        self.inner.cursor.get()
    }

    /// Walkthrough of the running entry.
    pub fn current(&self) -> Option<Walkthrough> {
        self.inner.current.borrow().clone()
    }

    /// `true` once the chain ran out of entries, was skipped or was stopped.
    pub fn is_halted(&self) -> bool {
        self.inner.halted.get()
    }

    /// Start the first eligible entry.
    pub fn start(&self) {
        if self.inner.halted.get() || self.inner.cursor.get().is_some() {
            return;
        }
        self.inner.host.record(
            CATEGORY,
            "start",
            None,
            Some(json!({ "entries": self.inner.entries.len() })),
        );
        self.advance();
    }

    /// Destroy the running entry and start the next one not yet completed.
    pub fn advance(&self) {
        let previous = self.inner.current.borrow_mut().take();
        if let Some(previous) = previous {
            previous.destroy();
        }
        if self.inner.halted.get() {
            return;
        }

        let storage = self.inner.host.storage.clone();
        let mut next = self.inner.cursor.get().map_or(0, |i| i + 1);
        while let Some(entry) = self.inner.entries.get(next) {
            if !entry.is_completed(storage.as_ref()) {
                break;
            }
            log::debug!("Chain passing over completed tour {}", entry.tour_id());
            self.inner.host.record(CATEGORY, "pass-over", Some(entry.tour_id()), None);
            next += 1;
        }

        let Some(entry) = self.inner.entries.get(next) else {
            self.inner.cursor.set(None);
            self.inner.halted.set(true);
            self.inner.host.record(CATEGORY, "complete", None, None);
            return;
        };
        self.inner.cursor.set(Some(next));

        let walkthrough = Walkthrough::new(
            self.inner.host.clone(),
            entry.steps.clone(),
            self.wrap_options(entry),
        );
        *self.inner.current.borrow_mut() = Some(walkthrough.clone());
        log::info!("Chain starting tour {} ({}/{})", entry.tour_id(), next + 1, self.inner.entries.len());
        self.inner.host.record(
            CATEGORY,
            "advance",
            Some(entry.tour_id()),
            Some(json!({ "index": next })),
        );
        self.inner
            .host
            .surface
            .spawn(async move { walkthrough.start(0).await }.boxed_local());
    }

    /// Halt the chain and skip the running tour with reason `"chain-stop"`.
    pub fn stop(&self) {
        if self.inner.halted.replace(true) {
            return;
        }
        let current = self.inner.current.borrow().clone();
        if let Some(walkthrough) = current {
            walkthrough.skip(Some(CHAIN_STOP_REASON));
        }
        self.inner.host.record(CATEGORY, "stop", None, None);
    }

    /// Halt the chain and tear down the running tour without callbacks.
    pub fn destroy(&self) {
        self.inner.halted.set(true);
        self.inner.cursor.set(None);
        let current = self.inner.current.borrow_mut().take();
        if let Some(walkthrough) = current {
            walkthrough.destroy();
        }
    }

    /// Options for an entry with the chain's own finish and skip handling
    /// layered over the caller's callbacks.
    fn wrap_options(&self, entry: &ChainEntry) -> WalkthroughOptions {
        let mut options = entry.options.clone();
        options.tour_id = Some(entry.tour_id().to_string());

        let weak: Weak<ChainInner> = Rc::downgrade(&self.inner);
        let user_finish = entry.options.on_finish.clone();
        options.on_finish = Some(Rc::new(move || {
            if let Some(on_finish) = &user_finish {
                on_finish();
            }
            if let Some(inner) = weak.upgrade() {
                TourChain { inner }.advance();
            }
        }));

        let weak: Weak<ChainInner> = Rc::downgrade(&self.inner);
        let user_skip = entry.options.on_skip.clone();
        options.on_skip = Some(Rc::new(move |reason: Option<String>| {
            if let Some(on_skip) = &user_skip {
                on_skip(reason.clone());
            }
            if let Some(inner) = weak.upgrade() {
                inner.halted.set(true);
                inner.cursor.set(None);
                inner.host.record(CATEGORY, "halt", reason.as_deref(), None);
            }
        }));
        options
    }
}

impl std::fmt::Debug for TourChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourChain")
            .field("entries", &self.inner.entries.len())
            .field("cursor", &self.inner.cursor.get())
            .field("halted", &self.inner.halted.get())
            .finish()
    }
}
