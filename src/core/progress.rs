//! Persisted tour progress and session-start markers.
//!
//! Every read tolerates missing or malformed data and every write swallows
//! backend failures: persistence is best-effort and must never abort a tour.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::storage::KeyValueStore;

/// Prefix of the durable progress record key.
pub const PROGRESS_KEY_PREFIX: &str = "__walkthrough:";
/// Prefix of the session-scoped "already started" marker key.
pub const SESSION_KEY_PREFIX: &str = "__wt_session_started:";
/// Value written for a session marker.
pub const SESSION_MARKER_VALUE: &str = "1";

/// Durable `{index, completed, ts}` record kept per tour id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub index: usize,
    pub completed: bool,
    /// Milliseconds since the Unix epoch of the last write.
    pub ts: i64,
}

impl ProgressRecord {
    pub fn new(index: usize, completed: bool) -> Self {
        Self {
            index,
            completed,
            ts: Utc::now().timestamp_millis(),
        }
    }

    /// Index to resume at, `None` once the tour has been completed.
    pub fn resume_index(&self) -> Option<usize> {
        (!self.completed).then_some(self.index)
    }
}

pub fn progress_key(tour_id: &str) -> String {
    format!("{PROGRESS_KEY_PREFIX}{tour_id}")
}

pub fn session_key(tour_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{tour_id}")
}

/// Read the record for `tour_id`. Absent, unreadable or malformed → `None`.
pub fn read_progress(store: &dyn KeyValueStore, tour_id: &str) -> Option<ProgressRecord> {
    let raw = match store.get(&progress_key(tour_id)) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Could not read progress for tour '{tour_id}': {e}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            log::debug!("Ignoring malformed progress record for '{tour_id}': {e}");
            None
        }
    }
}

pub fn write_progress(store: &dyn KeyValueStore, tour_id: &str, record: &ProgressRecord) {
    let raw = match serde_json::to_string(record) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("Could not encode progress for tour '{tour_id}': {e}");
            return;
        }
    };
    if let Err(e) = store.set(&progress_key(tour_id), &raw) {
        log::warn!("Could not persist progress for tour '{tour_id}': {e}");
    }
}

pub fn clear_progress(store: &dyn KeyValueStore, tour_id: &str) {
    if let Err(e) = store.remove(&progress_key(tour_id)) {
        log::warn!("Could not clear progress for tour '{tour_id}': {e}");
    }
}

pub fn is_completed(store: &dyn KeyValueStore, tour_id: &str) -> bool {
    read_progress(store, tour_id).is_some_and(|record| record.completed)
}

pub fn has_session_marker(session: &dyn KeyValueStore, tour_id: &str) -> bool {
    match session.get(&session_key(tour_id)) {
        Ok(value) => value.is_some(),
        Err(e) => {
            log::warn!("Could not read session marker for '{tour_id}': {e}");
            false
        }
    }
}

pub fn mark_session_started(session: &dyn KeyValueStore, tour_id: &str) {
    if let Err(e) = session.set(&session_key(tour_id), SESSION_MARKER_VALUE) {
        log::warn!("Could not set session marker for '{tour_id}': {e}");
    }
}
