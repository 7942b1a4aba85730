//! Event delivery.
//!
//! Firing an event notifies its immediate observers on the spot and queues
//! its deferred observers in a caller-owned [`DeferredEvents`] buffer. When
//! the unit of work finishes, [`DeferredEvents::complete`] releases the
//! queue: before-completion observers first, then the after-* observers whose
//! phase matches the outcome.
//!
//! Observer failures never propagate. An error or panic is logged and
//! counted, and delivery continues with the next observer.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use hive_core::errors::panic_message;
use tracing::{debug, warn};

use crate::cache::ObserverResolutionCache;
use crate::observer::{Event, Observer, Outcome, TransactionPhase};
use crate::registry::ObserverRegistry;

/// Counts from one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Observers notified successfully.
    pub delivered: usize,
    /// Observers that returned an error or panicked.
    pub failed: usize,
    /// Observers queued for completion.
    pub deferred: usize,
    /// Queued observers dropped because their phase did not match the outcome.
    pub skipped: usize,
}

impl Delivery {
    fn absorb(&mut self, other: Delivery) {
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.deferred += other.deferred;
        self.skipped += other.skipped;
    }
}

/// Deferred notifications awaiting the end of a unit of work.
#[derive(Default)]
pub struct DeferredEvents {
    queued: Vec<(Arc<dyn Observer>, Event)>,
}

impl DeferredEvents {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued notifications.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Release the queue for a unit of work that ended with `outcome`.
    pub fn complete(self, outcome: Outcome) -> Delivery {
        let mut delivery = Delivery::default();
        let (before, after): (Vec<_>, Vec<_>) = self
            .queued
            .into_iter()
            .partition(|(observer, _)| observer.phase() == TransactionPhase::BeforeCompletion);

        for (observer, event) in before.into_iter().chain(after) {
            if observer.phase().fires_on(outcome) {
                delivery.absorb(notify_one(observer.as_ref(), &event));
            } else {
                delivery.skipped += 1;
            }
        }
        debug!(
            ?outcome,
            delivered = delivery.delivered,
            failed = delivery.failed,
            skipped = delivery.skipped,
            "released deferred events"
        );
        delivery
    }
}

impl std::fmt::Debug for DeferredEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredEvents")
            .field("queued", &self.queued.len())
            .finish()
    }
}

/// Fires events to the observers registered for their type.
pub struct EventNotifier {
    registry: Arc<ObserverRegistry>,
    cache: Arc<ObserverResolutionCache>,
}

impl EventNotifier {
    /// Create a notifier over a registry and a resolution cache.
    pub fn new(registry: Arc<ObserverRegistry>, cache: Arc<ObserverResolutionCache>) -> Self {
        Self { registry, cache }
    }

    /// Notify immediate observers now and queue deferred ones in `deferred`.
    pub fn fire(&self, event: &Event, deferred: &mut DeferredEvents) -> Delivery {
        let event_type = event.event_type();
        let resolved = self
            .cache
            .resolve(event_type, self.registry.listeners_for(event_type));

        let mut delivery = Delivery::default();
        for observer in resolved.immediate().iter() {
            delivery.absorb(notify_one(observer.as_ref(), event));
        }
        for observer in resolved.deferred().iter() {
            deferred.queued.push((Arc::clone(observer), event.clone()));
            delivery.deferred += 1;
        }
        delivery
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish()
    }
}

fn notify_one(observer: &dyn Observer, event: &Event) -> Delivery {
    let failure = match catch_unwind(AssertUnwindSafe(|| observer.notify(event))) {
        Ok(Ok(())) => {
            return Delivery {
                delivered: 1,
                ..Delivery::default()
            };
        }
        Ok(Err(error)) => error.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };
    warn!(
        observer = observer.id(),
        event_type = %event.event_type(),
        error = %failure,
        "observer failed"
    );
    Delivery {
        failed: 1,
        ..Delivery::default()
    }
}
