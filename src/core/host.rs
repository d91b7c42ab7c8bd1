//! Bundle of host capabilities shared by engines, chains and orchestrators.

use std::rc::Rc;

use super::debug::DebugRecorder;
use super::storage::{KeyValueStore, MemoryStore};
use super::surface::{MemorySurface, Surface};

/// Document surface, durable store, session store and debug recorder.
#[derive(Clone)]
pub struct Host {
    pub surface: Rc<dyn Surface>,
    /// Durable store for progress records.
    pub storage: Rc<dyn KeyValueStore>,
    /// Session-scoped store for "already started" markers.
    pub session: Rc<dyn KeyValueStore>,
    pub debug: DebugRecorder,
}

impl Host {
    pub fn new(
        surface: Rc<dyn Surface>,
        storage: Rc<dyn KeyValueStore>,
        session: Rc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            surface,
            storage,
            session,
            debug: DebugRecorder::from_env(),
        }
    }

    pub fn with_debug(mut self, debug: DebugRecorder) -> Self {
        self.debug = debug;
        self
    }

    /// Host over a fresh [`MemorySurface`] and two [`MemoryStore`]s.
    pub fn in_memory() -> InMemoryHost {
        let surface = Rc::new(MemorySurface::new());
        let storage = MemoryStore::new();
        let session = MemoryStore::new();
        let host = Host::new(
            surface.clone(),
            Rc::new(storage.clone()),
            Rc::new(session.clone()),
        );
        InMemoryHost {
            host,
            surface,
            storage,
            session,
        }
    }

    pub(crate) fn record(
        &self,
        category: &str,
        kind: &str,
        message: Option<&str>,
        data: Option<serde_json::Value>,
    ) {
        self.debug.record(category, kind, message, data);
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("interactive", &self.surface.is_interactive())
            .field("debug", &self.debug)
            .finish()
    }
}

/// A [`Host`] together with typed handles to its in-memory parts.
#[derive(Clone)]
pub struct InMemoryHost {
    pub host: Host,
    pub surface: Rc<MemorySurface>,
    pub storage: MemoryStore,
    pub session: MemoryStore,
}
