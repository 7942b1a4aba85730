//! Layered settings loading.
//!
//! Loading flow, lowest priority first:
//! 1. Compiled [`HiveSettings::default()`]
//! 2. The JSON settings file, if it exists
//! 3. `HIVE_*` environment variables
//!
//! Environment keys use `__` between sections and snake case within them:
//! `HIVE_PROXY__DURABLE_MARKER` overrides `proxy.durableMarker`.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use figment::value::{Uncased, UncasedStr};
use tracing::debug;

use crate::errors::Result;
use crate::types::HiveSettings;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "HIVE_";

/// Resolve the path to the settings file (`~/.hive/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".hive").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HiveSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file is not an error; malformed JSON, mistyped values, and
/// values rejected by [`HiveSettings::validate`] are.
pub fn load_settings_from_path(path: &Path) -> Result<HiveSettings> {
    debug!(?path, exists = path.exists(), "loading settings");
    let settings: HiveSettings = settings_figment(path).extract()?;
    settings.validate()?;
    Ok(settings)
}

/// The layered figment behind [`load_settings_from_path`].
pub fn settings_figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(HiveSettings::default()))
        .merge(Json::file(path))
        .merge(Env::prefixed(ENV_PREFIX).lowercase(false).map(env_key))
}

/// Map `PROXY__DURABLE_MARKER` to `proxy.durableMarker`.
fn env_key(key: &UncasedStr) -> Uncased<'_> {
    Uncased::new(
        key.as_str()
            .split("__")
            .map(camel_case)
            .collect::<Vec<_>>()
            .join("."),
    )
}

fn camel_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper_next = false;
    for ch in segment.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out
}
