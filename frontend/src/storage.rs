//! `localStorage` / `sessionStorage` adapters.

use walkthrough::{KeyValueStore, StorageError};
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    Session,
}

/// Web Storage area, looked up on every call so a store created before the
/// page finished loading (or in a sandboxed frame) still degrades cleanly.
#[derive(Debug, Clone, Copy)]
pub struct WebStore {
    kind: StorageKind,
}

impl WebStore {
    pub fn local() -> Self {
        Self {
            kind: StorageKind::Local,
        }
    }

    pub fn session() -> Self {
        Self {
            kind: StorageKind::Session,
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Whether the storage area can be opened at all.
    pub fn is_available(&self) -> bool {
        self.area().is_ok()
    }

    fn area(&self) -> Result<web_sys::Storage, StorageError> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;
        let area = match self.kind {
            StorageKind::Local => window.local_storage(),
            StorageKind::Session => window.session_storage(),
        };
        area.map_err(|e| StorageError::Unavailable(describe(&e)))?
            .ok_or_else(|| StorageError::Unavailable(format!("{:?} storage disabled", self.kind)))
    }
}

impl KeyValueStore for WebStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.area()?
            .get_item(key)
            .map_err(|e| StorageError::Backend(describe(&e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Quota errors land here.
        self.area()?
            .set_item(key, value)
            .map_err(|e| StorageError::Backend(describe(&e)))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.area()?
            .remove_item(key)
            .map_err(|e| StorageError::Backend(describe(&e)))
    }
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
