//! Debug Recorder Module
//!
//! Opt-in, in-memory event log for diagnosing tour behaviour. Every call is a
//! no-op until the recorder is enabled, either through [`DebugRecorder::enable`]
//! or the `WALKTHROUGH_DEBUG` runtime flag. Enabled recorders keep a bounded
//! ring buffer and mirror each event to `tracing`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of events kept before the oldest are evicted.
pub const DEFAULT_CAPACITY: usize = 500;

/// Runtime flag that enables the recorder on native hosts.
pub const DEBUG_ENV_VAR: &str = "WALKTHROUGH_DEBUG";

// ============================================================================
// Types
// ============================================================================

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugEvent {
    /// Monotonic sequence number, survives eviction.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Subsystem: `engine`, `chain`, `orchestrator`, `route`.
    pub category: String,
    /// Event type, e.g. `start`, `step-missing`, `register`.
    pub kind: String,
    pub message: Option<String>,
    pub data: Option<serde_json::Value>,
}

/// Read-only copy of the buffer plus per-type counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugSnapshot {
    pub events: Vec<DebugEvent>,
    pub counts: BTreeMap<String, usize>,
}

/// Log levels served by [`DebugLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn all() -> [LogLevel; 4] {
        [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error]
    }

    fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

// ============================================================================
// Debug Logger
// ============================================================================

type LogSink = Rc<dyn Fn(&str)>;

/// Console-style logger backed by a table of closures keyed by level.
///
/// A disabled logger holds no-op closures, so call sites never branch on the
/// debug flag themselves.
#[derive(Clone)]
pub struct DebugLogger {
    sinks: HashMap<LogLevel, LogSink>,
}

impl DebugLogger {
    pub fn new(enabled: bool) -> Self {
        let sinks = LogLevel::all()
            .into_iter()
            .map(|level| {
                let sink: LogSink = if enabled {
                    let lvl = level.as_log_level();
                    Rc::new(move |msg: &str| log::log!(target: "walkthrough", lvl, "{msg}"))
                } else {
                    Rc::new(|_: &str| {})
                };
                (level, sink)
            })
            .collect();
        Self { sinks }
    }

    /// Replace the sink for one level (e.g. to capture output in a host UI).
    pub fn with_sink(mut self, level: LogLevel, sink: impl Fn(&str) + 'static) -> Self {
        self.sinks.insert(level, Rc::new(sink));
        self
    }

    pub fn log(&self, level: LogLevel, msg: &str) {
        if let Some(sink) = self.sinks.get(&level) {
            sink(msg);
        }
    }

    pub fn debug(&self, msg: &str) {
        self.log(LogLevel::Debug, msg);
    }

    pub fn info(&self, msg: &str) {
        self.log(LogLevel::Info, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.log(LogLevel::Warn, msg);
    }

    pub fn error(&self, msg: &str) {
        self.log(LogLevel::Error, msg);
    }
}

impl std::fmt::Debug for DebugLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugLogger")
            .field("levels", &self.sinks.len())
            .finish()
    }
}

// ============================================================================
// Debug Recorder
// ============================================================================

struct RecorderState {
    enabled: bool,
    capacity: usize,
    next_seq: u64,
    events: VecDeque<DebugEvent>,
    logger: DebugLogger,
}

/// Shared handle to the event buffer. Clones record into the same buffer.
#[derive(Clone)]
pub struct DebugRecorder {
    state: Rc<RefCell<RecorderState>>,
}

impl DebugRecorder {
    /// Disabled recorder with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(RecorderState {
                enabled: false,
                capacity: capacity.max(1),
                next_seq: 0,
                events: VecDeque::new(),
                logger: DebugLogger::new(false),
            })),
        }
    }

    /// Recorder enabled when `WALKTHROUGH_DEBUG` is set to `1`/`true`.
    pub fn from_env() -> Self {
        let recorder = Self::new();
        let flag = std::env::var(DEBUG_ENV_VAR).unwrap_or_default();
        if matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
            recorder.enable();
        }
        recorder
    }

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    pub fn disable(&self) {
        self.set_enabled(false);
    }

    pub fn set_enabled(&self, enabled: bool) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.enabled = enabled;
            state.logger = DebugLogger::new(enabled);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.try_borrow().map(|s| s.enabled).unwrap_or(false)
    }

    /// Logger whose sinks are live only while the recorder is enabled.
    pub fn logger(&self) -> DebugLogger {
        self.state
            .try_borrow()
            .map(|s| s.logger.clone())
            .unwrap_or_else(|_| DebugLogger::new(false))
    }

    /// Append an event. Never fails; silently dropped when disabled.
    pub fn record(
        &self,
        category: &str,
        kind: &str,
        message: Option<&str>,
        data: Option<serde_json::Value>,
    ) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        if !state.enabled {
            return;
        }

        tracing::debug!(
            category = category,
            kind = kind,
            message = message.unwrap_or_default(),
            "walkthrough event"
        );

        let seq = state.next_seq;
        state.next_seq += 1;
        state.events.push_back(DebugEvent {
            seq,
            timestamp: Utc::now(),
            category: category.to_string(),
            kind: kind.to_string(),
            message: message.map(str::to_string),
            data,
        });
        while state.events.len() > state.capacity {
            state.events.pop_front();
        }
    }

    /// Copy of all buffered events and counts by event type.
    pub fn snapshot(&self) -> DebugSnapshot {
        let Ok(state) = self.state.try_borrow() else {
            return DebugSnapshot::default();
        };
        let events: Vec<DebugEvent> = state.events.iter().cloned().collect();
        let mut counts = BTreeMap::new();
        for event in &events {
            *counts.entry(event.kind.clone()).or_insert(0) += 1;
        }
        DebugSnapshot { events, counts }
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.events.clear();
        }
    }
}

impl Default for DebugRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DebugRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugRecorder")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
