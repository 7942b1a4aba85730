//! Bean storage.
//!
//! A [`BeanStore`] holds the live instances of one scope together with the
//! bean definition needed to destroy them. Stores are supplied by the host
//! per unit of work (a distributed-session-backed store, a request-local
//! map) and are replaced wholesale on restore, never merged.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use hive_core::{BeanId, Contextual, Instance};

/// A live instance paired with the bean that created it.
#[derive(Clone)]
pub struct ContextualInstance {
    bean: Arc<dyn Contextual>,
    instance: Instance,
}

impl ContextualInstance {
    /// Pair an instance with its bean.
    pub fn new(bean: Arc<dyn Contextual>, instance: Instance) -> Self {
        Self { bean, instance }
    }

    /// The bean definition.
    pub fn bean(&self) -> &Arc<dyn Contextual> {
        &self.bean
    }

    /// The live instance.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Split into bean and instance.
    pub fn into_parts(self) -> (Arc<dyn Contextual>, Instance) {
        (self.bean, self.instance)
    }
}

impl fmt::Debug for ContextualInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualInstance")
            .field("bean", self.bean.id())
            .finish_non_exhaustive()
    }
}

/// Key-value storage of contextual instances within one scope.
pub trait BeanStore: Send + Sync {
    /// Instance stored under `id`, if any.
    fn get(&self, id: &BeanId) -> Option<ContextualInstance>;

    /// Store an instance, replacing any previous one under the same id.
    fn put(&self, id: BeanId, instance: ContextualInstance);

    /// Remove and return the instance under `id`.
    fn remove(&self, id: &BeanId) -> Option<ContextualInstance>;

    /// Whether an instance is stored under `id`.
    fn contains(&self, id: &BeanId) -> bool;

    /// Snapshot of every stored entry.
    ///
    /// Returned as an owned list so callers can run destroy callbacks, which
    /// may touch the store again, without holding any internal lock.
    fn entries(&self) -> Vec<(BeanId, ContextualInstance)>;

    /// Remove every entry without destroying anything.
    fn clear(&self);

    /// Number of stored instances.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default in-memory store backed by a sharded concurrent map.
#[derive(Default)]
pub struct ConcurrentBeanStore {
    instances: DashMap<BeanId, ContextualInstance>,
}

impl ConcurrentBeanStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with room for `capacity` instances.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            instances: DashMap::with_capacity(capacity),
        }
    }
}

impl BeanStore for ConcurrentBeanStore {
    fn get(&self, id: &BeanId) -> Option<ContextualInstance> {
        self.instances.get(id).map(|entry| entry.value().clone())
    }

    fn put(&self, id: BeanId, instance: ContextualInstance) {
        let _ = self.instances.insert(id, instance);
    }

    fn remove(&self, id: &BeanId) -> Option<ContextualInstance> {
        self.instances.remove(id).map(|(_, v)| v)
    }

    fn contains(&self, id: &BeanId) -> bool {
        self.instances.contains_key(id)
    }

    fn entries(&self) -> Vec<(BeanId, ContextualInstance)> {
        self.instances
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn clear(&self) {
        self.instances.clear();
    }

    fn len(&self) -> usize {
        self.instances.len()
    }
}

impl fmt::Debug for ConcurrentBeanStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentBeanStore")
            .field("instance_count", &self.instances.len())
            .finish()
    }
}
