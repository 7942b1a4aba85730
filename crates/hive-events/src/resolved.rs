//! Observers split by dispatch phase.
//!
//! An event type's listeners are partitioned once into an immediate group,
//! notified at fire time, and a deferred group, held until the unit of work
//! completes. The two groups are disjoint and together hold every listener.

use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::observer::Observer;

static EMPTY: LazyLock<Arc<ResolvedObservers>> = LazyLock::new(|| {
    Arc::new(ResolvedObservers {
        immediate: ObserverSet::default(),
        deferred: ObserverSet::default(),
    })
});

/// Immutable, deduplicated set of observers in first-seen order.
#[derive(Default)]
pub struct ObserverSet {
    observers: IndexMap<String, Arc<dyn Observer>>,
}

impl ObserverSet {
    fn insert(&mut self, observer: &Arc<dyn Observer>) {
        let _ = self
            .observers
            .entry(observer.id().to_string())
            .or_insert_with(|| Arc::clone(observer));
    }

    /// Observers in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Observer>> {
        self.observers.values()
    }

    /// Whether an observer with `id` is in the set.
    pub fn contains(&self, id: &str) -> bool {
        self.observers.contains_key(id)
    }

    /// Number of observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.observers.keys()).finish()
    }
}

/// The listeners of one event type, partitioned by dispatch phase.
#[derive(Debug)]
pub struct ResolvedObservers {
    immediate: ObserverSet,
    deferred: ObserverSet,
}

impl ResolvedObservers {
    /// Partition `listeners` in one pass.
    ///
    /// An empty input yields the shared [`empty`](Self::empty) value without
    /// allocating. An id is placed once, by its first occurrence; later
    /// listeners under the same id are ignored whatever their phase.
    pub fn of(listeners: &[Arc<dyn Observer>]) -> Arc<Self> {
        if listeners.is_empty() {
            return Self::empty();
        }
        let mut immediate = ObserverSet::default();
        let mut deferred = ObserverSet::default();
        for observer in listeners {
            let id = observer.id();
            if immediate.contains(id) || deferred.contains(id) {
                debug!(observer = id, phase = ?observer.phase(), "ignoring repeated observer id");
                continue;
            }
            if observer.phase().is_immediate() {
                immediate.insert(observer);
            } else {
                deferred.insert(observer);
            }
        }
        Arc::new(Self { immediate, deferred })
    }

    /// The shared result for an event type with no listeners.
    pub fn empty() -> Arc<Self> {
        Arc::clone(&EMPTY)
    }

    /// Listeners notified when the event is fired.
    pub fn immediate(&self) -> &ObserverSet {
        &self.immediate
    }

    /// Listeners held until the unit of work completes.
    pub fn deferred(&self) -> &ObserverSet {
        &self.deferred
    }

    /// Whether neither group has any listener.
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.deferred.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{Event, TransactionPhase};
    use hive_core::BoxError;
    use proptest::prelude::*;

    struct Listener {
        id: String,
        phase: TransactionPhase,
    }

    impl Observer for Listener {
        fn id(&self) -> &str {
            &self.id
        }
        fn phase(&self) -> TransactionPhase {
            self.phase
        }
        fn notify(&self, _event: &Event) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn listener(id: impl Into<String>, phase: TransactionPhase) -> Arc<dyn Observer> {
        Arc::new(Listener { id: id.into(), phase })
    }

    fn any_phase() -> impl Strategy<Value = TransactionPhase> {
        prop::sample::select(TransactionPhase::all().to_vec())
    }

    #[test]
    fn empty_input_shares_one_instance() {
        let a = ResolvedObservers::of(&[]);
        let b = ResolvedObservers::of(&[]);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &ResolvedObservers::empty()));
        assert!(a.is_empty());
    }

    #[test]
    fn splits_by_phase_keeping_order() {
        let listeners = vec![
            listener("audit", TransactionPhase::AfterSuccess),
            listener("log", TransactionPhase::InProgress),
            listener("mail", TransactionPhase::AfterCompletion),
            listener("metrics", TransactionPhase::InProgress),
        ];
        let resolved = ResolvedObservers::of(&listeners);

        let immediate: Vec<&str> = resolved.immediate().iter().map(|o| o.id()).collect();
        let deferred: Vec<&str> = resolved.deferred().iter().map(|o| o.id()).collect();
        assert_eq!(immediate, ["log", "metrics"]);
        assert_eq!(deferred, ["audit", "mail"]);
    }

    #[test]
    fn repeated_listener_is_kept_once() {
        let log = listener("log", TransactionPhase::InProgress);
        let resolved = ResolvedObservers::of(&[Arc::clone(&log), log]);
        assert_eq!(resolved.immediate().len(), 1);
        assert!(resolved.deferred().is_empty());
    }

    #[test]
    fn repeated_id_keeps_its_first_phase() {
        let resolved = ResolvedObservers::of(&[
            listener("audit", TransactionPhase::AfterSuccess),
            listener("audit", TransactionPhase::InProgress),
        ]);
        assert!(resolved.immediate().is_empty());
        assert!(resolved.deferred().contains("audit"));
        assert_eq!(resolved.deferred().len(), 1);
    }

    proptest! {
        #[test]
        fn colliding_ids_land_in_exactly_one_set(
            entries in prop::collection::vec((0..6_usize, any_phase()), 1..40)
        ) {
            let listeners: Vec<Arc<dyn Observer>> = entries
                .iter()
                .map(|(n, phase)| listener(format!("observer-{n}"), *phase))
                .collect();
            let resolved = ResolvedObservers::of(&listeners);

            let mut distinct: Vec<&str> = listeners.iter().map(|o| o.id()).collect();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert_eq!(
                resolved.immediate().len() + resolved.deferred().len(),
                distinct.len()
            );
            for id in distinct {
                let in_immediate = resolved.immediate().contains(id);
                let in_deferred = resolved.deferred().contains(id);
                prop_assert!(in_immediate != in_deferred);
                let first = listeners.iter().find(|o| o.id() == id).map(|o| o.phase().is_immediate());
                prop_assert_eq!(Some(in_immediate), first);
            }
        }

        #[test]
        fn partition_is_disjoint_and_complete(phases in prop::collection::vec(any_phase(), 1..40)) {
            let listeners: Vec<Arc<dyn Observer>> = phases
                .iter()
                .enumerate()
                .map(|(i, phase)| listener(format!("observer-{i}"), *phase))
                .collect();
            let resolved = ResolvedObservers::of(&listeners);

            prop_assert_eq!(
                resolved.immediate().len() + resolved.deferred().len(),
                listeners.len()
            );
            for observer in &listeners {
                let in_immediate = resolved.immediate().contains(observer.id());
                let in_deferred = resolved.deferred().contains(observer.id());
                prop_assert!(in_immediate != in_deferred);
                prop_assert_eq!(in_immediate, observer.phase().is_immediate());
            }
        }
    }
}
