/// Walkthrough - onboarding tour engine
///
/// Core library providing step spotlighting, overlay geometry, progress
/// persistence, tour chaining and route-matched auto-start. The document is
/// reached through the `Surface` trait so the engine runs the same way in a
/// browser host and in headless tests.

pub mod config;
pub mod core;

#[cfg(test)]
mod tests;

pub use crate::config::WalkthroughConfig;
pub use crate::core::chain::{ChainEntry, TourChain};
pub use crate::core::debug::{DebugRecorder, DebugSnapshot};
pub use crate::core::engine::{start_walkthrough, Walkthrough};
pub use crate::core::error::{Result, StorageError, WalkthroughError};
pub use crate::core::host::Host;
pub use crate::core::options::{ThemeMode, WalkthroughOptions};
pub use crate::core::orchestrator::{
    ModuleExport, PathMatcher, RegisteredTour, TourCondition, TourLoader, TourModule,
    TourOrchestrator, Trigger,
};
pub use crate::core::route::{RouteMode, RouteTours, TourSlot};
pub use crate::core::sanitize::sanitize;
pub use crate::core::step::{Step, StepHook};
pub use crate::core::storage::{KeyValueStore, MemoryStore};
pub use crate::core::surface::{MemorySurface, NullSurface, Surface};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
