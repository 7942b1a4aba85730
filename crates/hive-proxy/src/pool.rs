//! Container-wide client proxy cache.
//!
//! One proxy per bean for the lifetime of the container. Lookups never take
//! a lock beyond the map's shard read lock. First-time construction for a
//! bean is serialized on a per-bean gate, so concurrent callers for the same
//! bean wait for and share a single construction while callers for other
//! beans proceed in parallel.
//!
//! Construction is deterministic, so a failed attempt is recorded and handed
//! to every later caller instead of being retried.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use hive_core::{
    BeanId, BeanRegistry, Capability, ContainerError, ContainerService, Contextual,
    DEFAULT_DURABLE_MARKER, DefinitionError, InstanceResolver, ProxyConstructionError,
};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::dispatch::{ClientProxy, ContextualMethodHandler, DispatchGenerator};

/// Why a bean has no proxy.
#[derive(Debug, Clone)]
enum Failure {
    Definition(DefinitionError),
    Construction(ProxyConstructionError),
}

impl From<Failure> for ContainerError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Definition(e) => e.into(),
            Failure::Construction(e) => e.into(),
        }
    }
}

/// Compute-once cache of client proxies, keyed by bean identity.
pub struct ProxyPool {
    proxies: DashMap<BeanId, Arc<dyn ClientProxy>>,
    failures: DashMap<BeanId, Failure>,
    gates: DashMap<BeanId, Arc<Mutex<()>>>,
    registry: Arc<BeanRegistry>,
    resolver: Arc<dyn InstanceResolver>,
    generator: Arc<dyn DispatchGenerator>,
    durable_marker: Capability,
}

impl ProxyPool {
    /// Create an empty pool.
    ///
    /// `registry` is the authoritative membership table, `resolver` is what
    /// proxies forward through, and `generator` synthesizes proxy classes.
    pub fn new(
        registry: Arc<BeanRegistry>,
        resolver: Arc<dyn InstanceResolver>,
        generator: Arc<dyn DispatchGenerator>,
    ) -> Self {
        Self {
            proxies: DashMap::new(),
            failures: DashMap::new(),
            gates: DashMap::new(),
            registry,
            resolver,
            generator,
            durable_marker: Capability::interface(DEFAULT_DURABLE_MARKER),
        }
    }

    /// Pre-size the cache.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.proxies = DashMap::with_capacity(capacity);
        self
    }

    /// Use a different durability marker capability name.
    #[must_use]
    pub fn with_durable_marker(mut self, name: impl Into<String>) -> Self {
        self.durable_marker = Capability::interface(name);
        self
    }

    /// The proxy for `bean`.
    ///
    /// With `create` false this is a pure lookup and never constructs.
    /// With `create` true a missing proxy is built at most once, no matter
    /// how many callers race for it. If that single attempt fails, every
    /// caller, concurrent or later, receives the same error.
    pub fn get_or_create(
        &self,
        bean: &Arc<dyn Contextual>,
        create: bool,
    ) -> hive_core::Result<Option<Arc<dyn ClientProxy>>> {
        if let Some(proxy) = self.lookup(bean.id()) {
            return Ok(Some(proxy));
        }
        if !create {
            return Ok(None);
        }
        if let Some(failure) = self.recorded_failure(bean.id()) {
            return Err(failure.into());
        }

        // Gates live as long as the pool so that a waiter never races a
        // caller holding a newer gate for the same bean.
        let gate = Arc::clone(self.gates.entry(bean.id().clone()).or_default().value());
        let _held = gate.lock();
        if let Some(proxy) = self.lookup(bean.id()) {
            return Ok(Some(proxy));
        }
        if let Some(failure) = self.recorded_failure(bean.id()) {
            return Err(failure.into());
        }
        match self.construct(bean) {
            Ok(proxy) => {
                let _ = self.proxies.insert(bean.id().clone(), Arc::clone(&proxy));
                Ok(Some(proxy))
            }
            Err(failure) => {
                warn!(bean = %bean.id(), error = ?failure, "client proxy construction failed");
                let _ = self.failures.insert(bean.id().clone(), failure.clone());
                Err(failure.into())
            }
        }
    }

    /// The cached proxy for `id`, if one exists.
    pub fn get(&self, id: &BeanId) -> Option<Arc<dyn ClientProxy>> {
        self.lookup(id)
    }

    /// Whether a proxy for `id` has been constructed.
    pub fn contains(&self, id: &BeanId) -> bool {
        self.proxies.contains_key(id)
    }

    /// Whether construction of a proxy for `id` was attempted and failed.
    pub fn has_failed(&self, id: &BeanId) -> bool {
        self.failures.contains_key(id)
    }

    /// Number of cached proxies.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Whether no proxy has been constructed yet.
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Drop every cached proxy and recorded failure. Only meaningful at
    /// container teardown.
    pub fn clear(&self) {
        trace!(
            proxies = self.proxies.len(),
            failures = self.failures.len(),
            "clearing proxy pool"
        );
        self.proxies.clear();
        self.failures.clear();
        self.gates.clear();
    }

    fn lookup(&self, id: &BeanId) -> Option<Arc<dyn ClientProxy>> {
        self.proxies.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn recorded_failure(&self, id: &BeanId) -> Option<Failure> {
        self.failures.get(id).map(|entry| entry.value().clone())
    }

    fn construct(&self, bean: &Arc<dyn Contextual>) -> Result<Arc<dyn ClientProxy>, Failure> {
        let id = bean.id();
        let index = self
            .registry
            .index_of(id)
            .ok_or_else(|| Failure::Definition(DefinitionError::UnknownBean(id.clone())))?;

        let mut capabilities = bean.capabilities();
        let _ = capabilities.insert(self.durable_marker.clone());

        let class = self.generator.synthesize(&capabilities).map_err(|source| {
            Failure::Construction(ProxyConstructionError::Synthesis {
                bean: id.clone(),
                source: source.into(),
            })
        })?;
        let handler = Arc::new(ContextualMethodHandler::new(
            Arc::clone(bean),
            index,
            Arc::clone(&self.resolver),
        ));
        let proxy = class.instantiate(handler).map_err(|source| {
            Failure::Construction(ProxyConstructionError::Instantiation {
                bean: id.clone(),
                source: source.into(),
            })
        })?;

        debug!(bean = %id, index, capabilities = capabilities.len(), "constructed client proxy");
        Ok(proxy)
    }
}

impl ContainerService for ProxyPool {
    fn name(&self) -> &str {
        "proxy-pool"
    }

    fn cleanup(&self) {
        self.clear();
    }
}

impl fmt::Display for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proxy pool with {} proxies", self.proxies.len())
    }
}

impl fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPool")
            .field("proxy_count", &self.proxies.len())
            .field("failed_count", &self.failures.len())
            .field("durable_marker", &self.durable_marker.name())
            .finish_non_exhaustive()
    }
}
