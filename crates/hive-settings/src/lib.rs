//! # hive-settings
//!
//! Layered configuration for the Hive container.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HiveSettings::default()`]
//! 2. **Settings file**: `~/.hive/settings.json`, or a path given by the host
//! 3. **Environment variables**: `HIVE_*` overrides (highest priority)
//!
//! There is no global settings instance. The host loads settings once and
//! hands them to the container builder.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{ENV_PREFIX, load_settings, load_settings_from_path, settings_figment, settings_path};
pub use types::{HiveSettings, LoggingSettings, ObserverSettings, ProxySettings, StoreSettings};
