//! Walkthrough scenario tests
//!
//! Cross-module flows on the in-memory host: persistence and resume, step
//! resolution outcomes, orchestrator gating and chaining, tooltip
//! sanitisation, and the debug recorder seen through a whole tour.

mod common;

mod orchestrator_flow_tests;
