//! # liftoff-settings
//!
//! Configuration with layered sources for the launch coordinator.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`LaunchSettings::default()`]
//! 2. **Settings file**: `$LIFTOFF_CONFIG` or `~/.liftoff/settings.json`
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `LIFTOFF_*` overrides (highest priority)
//!
//! The binary applies command-line flags on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
