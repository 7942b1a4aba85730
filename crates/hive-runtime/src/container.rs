//! The container facade.
//!
//! [`ContainerBuilder`] collects bean and observer registrations, then wires
//! the registry, context manager, proxy pool and observer cache together
//! exactly once. The resulting [`Container`] hands those parts out by
//! reference; nothing is reachable through global state.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use hive_context::{ContextManager, DestructionReport};
use hive_core::{BeanId, BeanRegistry, Contextual, DefinitionError, Instance, InstanceResolver};
use hive_events::{
    DeferredEvents, Delivery, Event, EventNotifier, EventType, Observer, ObserverRegistry,
    ObserverResolutionCache,
};
use hive_proxy::{ClientProxy, DispatchGenerator, ForwardingGenerator, ProxyPool};
use hive_settings::HiveSettings;
use tracing::{debug, info};

/// What a caller gets when asking for a bean.
#[derive(Debug, Clone)]
pub enum BeanReference {
    /// A client proxy, for beans in normal scopes.
    Proxy(Arc<dyn ClientProxy>),
    /// The instance itself, for singleton and dependent beans.
    Direct(Instance),
}

impl BeanReference {
    /// The instance a call made now would reach.
    pub fn instance(&self) -> hive_core::Result<Instance> {
        match self {
            Self::Proxy(proxy) => proxy.target(),
            Self::Direct(instance) => Ok(Arc::clone(instance)),
        }
    }

    /// The current instance as a `T`; `Ok(None)` when it is another type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> hive_core::Result<Option<Arc<T>>> {
        Ok(self.instance()?.downcast::<T>().ok())
    }

    /// Whether this reference is a client proxy.
    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }
}

/// Collects registrations and builds a [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    settings: HiveSettings,
    beans: Vec<Arc<dyn Contextual>>,
    observers: Vec<(EventType, Arc<dyn Observer>)>,
    generator: Option<Arc<dyn DispatchGenerator>>,
}

impl ContainerBuilder {
    /// Start with default settings and no registrations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `settings` instead of the defaults.
    #[must_use]
    pub fn settings(mut self, settings: HiveSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Register a bean.
    #[must_use]
    pub fn bean(mut self, bean: Arc<dyn Contextual>) -> Self {
        self.beans.push(bean);
        self
    }

    /// Register an observer for `event_type`.
    #[must_use]
    pub fn observer(mut self, event_type: impl Into<EventType>, observer: Arc<dyn Observer>) -> Self {
        self.observers.push((event_type.into(), observer));
        self
    }

    /// Use a custom proxy generator instead of [`ForwardingGenerator`].
    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn DispatchGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Wire everything together.
    ///
    /// Fails if two beans share an id.
    pub fn build(self) -> Result<Container, DefinitionError> {
        let Self {
            settings,
            beans,
            observers,
            generator,
        } = self;

        let mut registry = BeanRegistry::new();
        for bean in beans {
            let _ = registry.register(bean)?;
        }
        let registry = Arc::new(registry);

        let mut observer_registry = ObserverRegistry::new();
        for (event_type, observer) in observers {
            observer_registry.register(event_type, observer);
        }

        let contexts = Arc::new(
            ContextManager::new().with_singleton_capacity(settings.stores.initial_capacity),
        );
        let resolver: Arc<dyn InstanceResolver> = Arc::clone(&contexts) as Arc<dyn InstanceResolver>;
        let generator = generator
            .unwrap_or_else(|| Arc::new(ForwardingGenerator::new()) as Arc<dyn DispatchGenerator>);
        let proxies = Arc::new(
            ProxyPool::new(Arc::clone(&registry), resolver, generator)
                .with_capacity(settings.proxy.initial_capacity)
                .with_durable_marker(settings.proxy.durable_marker.clone()),
        );
        let observer_cache = Arc::new(ObserverResolutionCache::with_capacity(
            settings.observers.initial_capacity,
        ));
        contexts.register_service(&proxies);
        contexts.register_service(&observer_cache);

        let notifier = EventNotifier::new(Arc::new(observer_registry), Arc::clone(&observer_cache));

        info!(
            beans = registry.len(),
            durable_marker = %settings.proxy.durable_marker,
            "container built"
        );
        Ok(Container {
            registry,
            contexts,
            proxies,
            observer_cache,
            notifier,
            settings,
        })
    }
}

/// A wired container.
pub struct Container {
    registry: Arc<BeanRegistry>,
    contexts: Arc<ContextManager>,
    proxies: Arc<ProxyPool>,
    observer_cache: Arc<ObserverResolutionCache>,
    notifier: EventNotifier,
    settings: HiveSettings,
}

impl Container {
    /// Start building a container.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// The registration table.
    pub fn registry(&self) -> &Arc<BeanRegistry> {
        &self.registry
    }

    /// Scope lifecycle.
    pub fn contexts(&self) -> &Arc<ContextManager> {
        &self.contexts
    }

    /// Client proxy cache.
    pub fn proxies(&self) -> &Arc<ProxyPool> {
        &self.proxies
    }

    /// Observer partition cache.
    pub fn observer_cache(&self) -> &Arc<ObserverResolutionCache> {
        &self.observer_cache
    }

    /// Settings the container was built with.
    pub fn settings(&self) -> &HiveSettings {
        &self.settings
    }

    /// A reference to the bean registered under `id`.
    ///
    /// Beans in normal scopes are reached through their client proxy, which
    /// is built on first request. Singleton and dependent beans are resolved
    /// directly from their context.
    pub fn get_reference(&self, id: &BeanId) -> hive_core::Result<BeanReference> {
        let bean = self.registry.require(id)?;
        if bean.scope().is_normal() {
            match self.proxies.get_or_create(bean, true)? {
                Some(proxy) => Ok(BeanReference::Proxy(proxy)),
                None => Err(DefinitionError::UnknownBean(id.clone()).into()),
            }
        } else {
            debug!(bean = %id, scope = %bean.scope(), "resolving direct reference");
            Ok(BeanReference::Direct(self.contexts.resolve(bean)?))
        }
    }

    /// Fire `event`; deferred observers are queued in `deferred`.
    pub fn fire(&self, event: &Event, deferred: &mut DeferredEvents) -> Delivery {
        self.notifier.fire(event, deferred)
    }

    /// End the application: destroy application and singleton instances,
    /// clear the proxy pool and observer cache, and deactivate every scope
    /// held by the calling thread.
    pub fn shutdown(&self) -> DestructionReport {
        info!(proxies = self.proxies.len(), "shutting down container");
        self.contexts.end_application()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registry", &self.registry)
            .field("contexts", &self.contexts)
            .field("proxies", &self.proxies)
            .field("observer_cache", &self.observer_cache)
            .finish_non_exhaustive()
    }
}
