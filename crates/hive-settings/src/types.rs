//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`: field names
//! are camelCase in JSON and any missing field keeps its compiled default.

use hive_core::DEFAULT_DURABLE_MARKER;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for a Hive container.
///
/// ```json
/// {
///   "logging": { "level": "debug" },
///   "proxy": { "durableMarker": "app::Serializable" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HiveSettings {
    /// Log output.
    pub logging: LoggingSettings,
    /// Client proxy pool.
    pub proxy: ProxySettings,
    /// Container-owned bean stores.
    pub stores: StoreSettings,
    /// Observer resolution cache.
    pub observers: ObserverSettings,
}

impl HiveSettings {
    /// Reject values the container cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.proxy.durable_marker.trim().is_empty() {
            return Err(SettingsError::InvalidValue("proxy.durableMarker is empty".into()));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(SettingsError::InvalidValue(format!(
                "logging.level must be one of {}, got {:?}",
                LOG_LEVELS.join("/"),
                self.logging.level
            )));
        }
        Ok(())
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Client proxy pool settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxySettings {
    /// Name of the marker capability added to every proxy.
    pub durable_marker: String,
    /// Pre-sized proxy cache capacity.
    pub initial_capacity: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            durable_marker: DEFAULT_DURABLE_MARKER.into(),
            initial_capacity: 64,
        }
    }
}

/// Settings for stores the container creates itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Initial capacity of the singleton store.
    pub initial_capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { initial_capacity: 64 }
    }
}

/// Observer resolution cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObserverSettings {
    /// Pre-sized cache capacity, in event types.
    pub initial_capacity: usize,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self { initial_capacity: 32 }
    }
}
