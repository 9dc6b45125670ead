//! # tide-settings
//!
//! Agent configuration. Each layer overrides the one before it:
//!
//! 1. [`TideSettings::default()`]
//! 2. `~/.tide/settings.json`, merged key by key
//! 3. `TIDE_*` environment variables
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
