//! Common Test Utilities
//!
//! Shared fixtures for building in-memory hosts, steps and tours.

pub mod fixtures;

pub use fixtures::*;
