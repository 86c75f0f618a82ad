//! Shared utilities for the integration test suites

pub mod fixtures;
pub mod helpers;

pub use fixtures::{Gate, ScriptedProvider};
pub use helpers::{alexandria, area_km, collect_events, fast_config, orchestrator, wait_for_calls};
