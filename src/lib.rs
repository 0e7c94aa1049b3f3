//! Claimflow - onboarding wizard navigation and browser-agent handoff for
//! disability claim intake
//!
//! This library module exports the orchestration core for the `claimflow`
//! CLI, the generate_types binary and integration tests.

pub mod api;
pub mod bridge;
pub mod config;
pub mod legal_form;
pub mod logging;
pub mod presenter;
pub mod steps;
pub mod store;
