//! Per-scope context.
//!
//! A [`Context`] is created once per scope kind when the container starts and
//! is never dropped, only deactivated.
//!
//! Application and Singleton contexts hold one state shared by every thread.
//! Unit-of-work scopes (Session, Conversation, Request, Dependent) hold one
//! state per thread driving a unit of work, so concurrent requests never see
//! each other's store or active flag. A thread's state is released once it is
//! inactive, detached and holds no dependents. Flags are atomics so that
//! monitoring code may read them while the controlling thread flips them.
//!
//! Instance policy:
//! - normal scopes look the bean up in the attached store and create it there
//!   on first use, at most once per store even under concurrent access;
//! - the Dependent scope never stores; every request creates a new instance,
//!   which is tracked and destroyed when the scope is torn down.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use hive_core::errors::panic_message;
use hive_core::{BeanId, ContextError, Contextual, DestructionError, Instance, ScopeKind};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::report::DestructionReport;
use crate::store::{BeanStore, ContextualInstance};

/// Destroy passes over a store before giving up on callbacks that keep
/// creating instances.
const MAX_DESTROY_PASSES: usize = 4;

/// Active flag, store and dependents of one scope on one unit of work.
#[derive(Default)]
struct State {
    active: AtomicBool,
    store: RwLock<Option<Arc<dyn BeanStore>>>,
    dependents: Mutex<Vec<ContextualInstance>>,
}

impl State {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn is_idle(&self) -> bool {
        !self.is_active() && self.store.read().is_none() && self.dependents.lock().is_empty()
    }
}

enum Binding {
    Shared(Arc<State>),
    PerThread(DashMap<ThreadId, Arc<State>>),
}

/// The runtime state of one scope.
pub struct Context {
    scope: ScopeKind,
    binding: Binding,
    // One gate per bean id, kept for the container's lifetime.
    gates: DashMap<BeanId, Arc<Mutex<()>>>,
}

impl Context {
    /// Create an inactive context with no store.
    #[must_use]
    pub fn new(scope: ScopeKind) -> Self {
        let binding = if scope.is_unit_of_work() {
            Binding::PerThread(DashMap::new())
        } else {
            Binding::Shared(Arc::default())
        };
        Self {
            scope,
            binding,
            gates: DashMap::new(),
        }
    }

    /// The scope this context serves.
    pub fn scope(&self) -> ScopeKind {
        self.scope
    }

    /// Whether each thread sees its own state for this context.
    pub fn is_per_thread(&self) -> bool {
        matches!(self.binding, Binding::PerThread(_))
    }

    /// Whether the scope is usable from the calling thread.
    pub fn is_active(&self) -> bool {
        self.current().is_some_and(|state| state.is_active())
    }

    /// Flip the active flag seen by the calling thread.
    pub fn set_active(&self, active: bool) {
        if active {
            self.current_or_insert().active.store(true, Ordering::Release);
        } else if let Some(state) = self.current() {
            state.active.store(false, Ordering::Release);
            self.release_if_idle();
        }
    }

    /// The store attached for the calling thread, if any.
    pub fn store(&self) -> Option<Arc<dyn BeanStore>> {
        self.current().and_then(|state| state.store.read().clone())
    }

    /// Attach or detach the backing store for the calling thread.
    pub fn set_store(&self, store: Option<Arc<dyn BeanStore>>) {
        match store {
            Some(store) => *self.current_or_insert().store.write() = Some(store),
            None => {
                if let Some(state) = self.current() {
                    *state.store.write() = None;
                    self.release_if_idle();
                }
            }
        }
    }

    /// Number of dependent instances awaiting destruction on the calling
    /// thread.
    pub fn dependent_count(&self) -> usize {
        self.current().map_or(0, |state| state.dependents.lock().len())
    }

    /// Current instance of `bean` in this scope, without creating one.
    ///
    /// The Dependent scope holds no shared instances and always answers
    /// `None`.
    pub fn get(&self, bean: &Arc<dyn Contextual>) -> Result<Option<Instance>, ContextError> {
        let state = self.active_state()?;
        if self.scope == ScopeKind::Dependent {
            return Ok(None);
        }
        let store = self.require_store(&state)?;
        Ok(store.get(bean.id()).map(|ci| Arc::clone(ci.instance())))
    }

    /// Current instance of `bean` in this scope, creating and storing it on
    /// first use.
    ///
    /// Creation is serialized per bean: concurrent first calls wait for a
    /// single instance rather than each creating one.
    pub fn get_or_create(&self, bean: &Arc<dyn Contextual>) -> Result<Instance, ContextError> {
        let state = self.active_state()?;

        if self.scope == ScopeKind::Dependent {
            let instance = create(bean)?;
            state
                .dependents
                .lock()
                .push(ContextualInstance::new(Arc::clone(bean), Arc::clone(&instance)));
            return Ok(instance);
        }

        let store = self.require_store(&state)?;
        if let Some(existing) = store.get(bean.id()) {
            return Ok(Arc::clone(existing.instance()));
        }

        let gate = Arc::clone(self.gates.entry(bean.id().clone()).or_default().value());
        let _held = gate.lock();
        if let Some(existing) = store.get(bean.id()) {
            return Ok(Arc::clone(existing.instance()));
        }
        let instance = create(bean)?;
        debug!(bean = %bean.id(), scope = %self.scope, "created contextual instance");
        store.put(
            bean.id().clone(),
            ContextualInstance::new(Arc::clone(bean), Arc::clone(&instance)),
        );
        Ok(instance)
    }

    /// Destroy every instance this context owns for the calling thread.
    ///
    /// Each instance's destroy callback runs even if an earlier one failed or
    /// panicked. Instances created by a destroy callback are destroyed in a
    /// further pass. With no store attached there is nothing to destroy.
    pub fn destroy(&self) -> DestructionReport {
        let mut report = DestructionReport::new();
        let Some(state) = self.current() else {
            trace!(scope = %self.scope, "destroy with no state on this thread");
            return report;
        };

        if self.scope == ScopeKind::Dependent {
            let drained: Vec<ContextualInstance> = std::mem::take(&mut *state.dependents.lock());
            // Most recently created first, so dependents outlive nothing they use.
            for entry in drained.into_iter().rev() {
                self.destroy_one(entry, &mut report);
            }
            self.release_if_idle();
            return report;
        }

        let Some(store) = state.store.read().clone() else {
            trace!(scope = %self.scope, "destroy with no store attached");
            return report;
        };

        for pass in 1..=MAX_DESTROY_PASSES {
            let entries = store.entries();
            if entries.is_empty() {
                return report;
            }
            if pass > 1 {
                debug!(scope = %self.scope, pass, count = entries.len(), "destroying instances created during destruction");
            }
            for (id, entry) in entries {
                self.destroy_one(entry, &mut report);
                let _ = store.remove(&id);
            }
        }

        let left = store.len();
        if left > 0 {
            warn!(
                scope = %self.scope,
                dropped = left,
                "destroy callbacks kept creating instances; dropping them undestroyed"
            );
            store.clear();
        }
        report
    }

    /// Destroy everything, detach the store and deactivate.
    pub fn cleanup(&self) -> DestructionReport {
        let report = self.destroy();
        self.set_store(None);
        self.set_active(false);
        report
    }

    fn current(&self) -> Option<Arc<State>> {
        match &self.binding {
            Binding::Shared(state) => Some(Arc::clone(state)),
            Binding::PerThread(states) => states
                .get(&thread::current().id())
                .map(|entry| Arc::clone(entry.value())),
        }
    }

    fn current_or_insert(&self) -> Arc<State> {
        match &self.binding {
            Binding::Shared(state) => Arc::clone(state),
            Binding::PerThread(states) => {
                Arc::clone(states.entry(thread::current().id()).or_default().value())
            }
        }
    }

    fn release_if_idle(&self) {
        if let Binding::PerThread(states) = &self.binding {
            let _ = states.remove_if(&thread::current().id(), |_, state| state.is_idle());
        }
    }

    #[cfg(test)]
    fn bound_threads(&self) -> usize {
        match &self.binding {
            Binding::Shared(_) => 0,
            Binding::PerThread(states) => states.len(),
        }
    }

    fn active_state(&self) -> Result<Arc<State>, ContextError> {
        self.current()
            .filter(|state| state.is_active())
            .ok_or(ContextError::NotActive(self.scope))
    }

    fn require_store(&self, state: &State) -> Result<Arc<dyn BeanStore>, ContextError> {
        state
            .store
            .read()
            .clone()
            .ok_or(ContextError::MissingStore(self.scope))
    }

    fn destroy_one(&self, entry: ContextualInstance, report: &mut DestructionReport) {
        let (bean, instance) = entry.into_parts();
        let outcome = catch_unwind(AssertUnwindSafe(|| bean.destroy_instance(instance)));
        let error = match outcome {
            Ok(Ok(())) => {
                report.record_destroyed();
                return;
            }
            Ok(Err(source)) => DestructionError::Failed {
                bean: bean.id().clone(),
                scope: self.scope,
                source,
            },
            Err(payload) => DestructionError::Panicked {
                bean: bean.id().clone(),
                scope: self.scope,
                message: panic_message(payload.as_ref()),
            },
        };
        warn!(bean = %bean.id(), scope = %self.scope, error = %error, "instance destruction failed");
        report.record_failure(error);
    }
}

fn create(bean: &Arc<dyn Contextual>) -> Result<Instance, ContextError> {
    bean.create_instance().map_err(|source| ContextError::Creation {
        bean: bean.id().clone(),
        source,
    })
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("scope", &self.scope)
            .field("per_thread", &self.is_per_thread())
            .field("active", &self.is_active())
            .field("has_store", &self.store().is_some())
            .finish()
    }
}
