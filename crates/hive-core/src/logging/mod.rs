//! Structured logging with `tracing`.
//!
//! The container logs scope transitions at `trace`, cache fills at `debug`
//! and contained failures (destroy callbacks, listener errors) at `warn`.
//! Hosts call [`init_subscriber`] or [`init_subscriber_json`] once at startup;
//! tests use [`test_utils::capture_logs`] instead.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// Install a human-readable stderr subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already set
    let _ = subscriber.try_init();
}

/// Install a JSON stderr subscriber for log shipping.
///
/// Same filtering rules as [`init_subscriber`].
pub fn init_subscriber_json(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    let _ = subscriber.try_init();
}
