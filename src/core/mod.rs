pub mod error;
pub mod host;
pub mod storage;
pub mod progress;
pub mod debug;
pub mod sanitize;
#[cfg(feature = "cli")]
pub mod logging;

// Engine building blocks
pub mod geometry;
pub mod keyboard;
pub mod tooltip;
pub mod step;
pub mod options;
pub mod surface;

// Runtime
pub mod engine;
pub mod chain;
pub mod orchestrator;
pub mod route;
