//! Seams between the container crates.
//!
//! The container is assembled from independently constructed parts that are
//! passed to each other by reference. These traits are the only points where
//! one crate calls into another without depending on it.

use std::sync::Arc;

use crate::bean::{Contextual, Instance};
use crate::errors::Result;

/// A container-wide component with state to release on shutdown.
///
/// Registered with the context manager; `cleanup` runs once the application
/// scope has ended.
pub trait ContainerService: Send + Sync {
    /// Name used in logs and cleanup error reports.
    fn name(&self) -> &str;

    /// Drop all container-lifetime state.
    fn cleanup(&self);
}

/// Resolves the current instance of a bean from whatever scope it lives in.
///
/// Client proxies call this on every access rather than holding an instance,
/// so a proxy stays valid when its scope is left and re-entered.
pub trait InstanceResolver: Send + Sync {
    /// Return the instance for `bean` in the currently active scope, creating
    /// it if the scope does not hold one yet.
    fn resolve(&self, bean: &Arc<dyn Contextual>) -> Result<Instance>;
}
