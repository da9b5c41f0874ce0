//! Tests for action flows
//!
//! Organized by component: steps, registry, runner, and the built-in actions

mod adapter_tests;
mod api_tests;
mod helpers;
mod runner_tests;
