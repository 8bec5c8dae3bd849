//! Configuration module for the fatigue dashboard.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AlarmConfig, AppConfig, BackendConfig, FrameConfig, PoseConfig, RiskThresholds, UiConfig,
};
