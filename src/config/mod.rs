//! Configuration module for the transcript-correction core.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.  Every config tree is validated at
//! construction time — out-of-range values fail fast, not at first use.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, ConfigError, CorrectionLevel, CorrectorConfig, ResourceConfig};
