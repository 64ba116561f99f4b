//! reviewbench: benchmark harness and review bot for LLM code reviewers
//! (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod bench;
pub mod config;
pub mod constants;
pub mod diff;
pub mod env;
pub mod extract;
pub mod host;
pub mod listener;
pub mod logging;
pub mod models;
pub mod output;
pub mod providers;
pub mod review;
pub mod runner;
pub mod session;
pub mod transcript;
