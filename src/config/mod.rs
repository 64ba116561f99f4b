//! Configuration loading and layering.
//!
//! Handles `.reviewbench.toml` loading, environment variable resolution,
//! and projection of the [`ReviewerConfig`] value object the review
//! components are built from.

pub mod loader;

pub use loader::{
    Config, ConfigError, GitLabConfig, ListenerConfig, LoggingConfig, ProviderConfig,
    ReviewConfig, ReviewerConfig, RunnerConfig,
};
