//! Per-event-type cache of partitioned observers.

use std::sync::Arc;

use dashmap::DashMap;
use hive_core::ContainerService;
use tracing::debug;

use crate::observer::{EventType, Observer};
use crate::resolved::ResolvedObservers;

/// Caches [`ResolvedObservers`] by event type so repeated firing of the same
/// type does not re-partition its listeners.
#[derive(Default)]
pub struct ObserverResolutionCache {
    resolved: DashMap<EventType, Arc<ResolvedObservers>>,
}

impl ObserverResolutionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache with room for `capacity` event types.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            resolved: DashMap::with_capacity(capacity),
        }
    }

    /// The partition of `listeners` for `event_type`, computed on first use.
    ///
    /// An empty listener list resolves to the shared empty value and is not
    /// cached.
    pub fn resolve(&self, event_type: &EventType, listeners: &[Arc<dyn Observer>]) -> Arc<ResolvedObservers> {
        if listeners.is_empty() {
            return ResolvedObservers::empty();
        }
        if let Some(hit) = self.resolved.get(event_type) {
            return Arc::clone(hit.value());
        }
        let entry = self.resolved.entry(event_type.clone()).or_insert_with(|| {
            let resolved = ResolvedObservers::of(listeners);
            debug!(
                event_type = %event_type,
                immediate = resolved.immediate().len(),
                deferred = resolved.deferred().len(),
                "resolved observers"
            );
            resolved
        });
        Arc::clone(entry.value())
    }

    /// Forget the cached partition for `event_type`.
    pub fn invalidate(&self, event_type: &EventType) -> bool {
        self.resolved.remove(event_type).is_some()
    }

    /// Number of cached event types.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Drop every cached partition.
    pub fn clear(&self) {
        self.resolved.clear();
    }
}

impl ContainerService for ObserverResolutionCache {
    fn name(&self) -> &str {
        "observer-resolution-cache"
    }

    fn cleanup(&self) {
        self.clear();
    }
}

impl std::fmt::Debug for ObserverResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverResolutionCache")
            .field("event_types", &self.resolved.len())
            .finish()
    }
}
