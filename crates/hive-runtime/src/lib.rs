//! # hive-runtime
//!
//! The assembled Hive container.
//!
//! ```text
//! ContainerBuilder ──build──▶ Container
//!                              ├── BeanRegistry            (who exists)
//!                              ├── ContextManager          (which scopes are live)
//!                              ├── ProxyPool               (one proxy per normal-scoped bean)
//!                              └── ObserverResolutionCache (who hears which event, and when)
//! ```
//!
//! The host drives scope transitions through [`Container::contexts`] at
//! unit-of-work boundaries and asks for beans with
//! [`Container::get_reference`].

#![deny(unsafe_code)]

pub mod container;

pub use container::{BeanReference, Container, ContainerBuilder};

use hive_settings::LoggingSettings;

/// Install the `tracing` subscriber described by `settings`.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_logging(settings: &LoggingSettings) {
    if settings.json {
        hive_core::logging::init_subscriber_json(&settings.level);
    } else {
        hive_core::logging::init_subscriber(&settings.level);
    }
}
