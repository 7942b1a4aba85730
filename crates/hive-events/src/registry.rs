//! Explicit event type → listeners table.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::observer::{EventType, Observer};

/// Every listener the container knows about, grouped by event type.
///
/// Built once at startup, like the bean registry, then shared read-only.
#[derive(Default)]
pub struct ObserverRegistry {
    listeners: IndexMap<EventType, Vec<Arc<dyn Observer>>>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for `event_type`.
    pub fn register(&mut self, event_type: impl Into<EventType>, observer: Arc<dyn Observer>) {
        let event_type = event_type.into();
        debug!(event_type = %event_type, observer = observer.id(), phase = ?observer.phase(), "registering observer");
        self.listeners.entry(event_type).or_default().push(observer);
    }

    /// Listeners registered for `event_type`, in registration order.
    pub fn listeners_for(&self, event_type: &EventType) -> &[Arc<dyn Observer>] {
        self.listeners.get(event_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Event types with at least one listener.
    pub fn event_types(&self) -> impl Iterator<Item = &EventType> {
        self.listeners.keys()
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("event_types", &self.listeners.len())
            .field("registrations", &self.len())
            .finish()
    }
}
