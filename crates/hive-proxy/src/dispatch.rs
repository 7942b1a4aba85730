//! Dynamic dispatch seams.
//!
//! A client proxy is an object that appears to implement a bean's declared
//! capabilities and forwards every call to the bean's *current* instance.
//! How the forwarding type comes into existence is pluggable:
//!
//! - [`DispatchGenerator`] synthesizes a [`ProxyClass`] for a capability set
//! - [`ProxyClass::instantiate`] binds a class to a [`MethodHandler`]
//! - [`MethodHandler`] resolves the target instance on every call
//!
//! [`ForwardingGenerator`] is the built-in generator. It produces trait-object
//! forwarding structs and refuses sealed capabilities, which cannot be
//! extended by a generated type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use hive_core::{
    BeanId, BoxError, CapabilityKind, CapabilitySet, Contextual, Instance, InstanceResolver,
};
use thiserror::Error;
use tracing::debug;

/// Forwards calls on a client proxy to a freshly resolved instance.
pub trait MethodHandler: Send + Sync + fmt::Debug {
    /// The bean being proxied.
    fn bean(&self) -> &Arc<dyn Contextual>;

    /// The bean's position in the registration table.
    fn index(&self) -> usize;

    /// Resolve the instance the next call should be forwarded to.
    fn target(&self) -> hive_core::Result<Instance>;
}

/// A scope-crossing reference to a bean.
pub trait ClientProxy: Send + Sync + fmt::Debug {
    /// Identity of the proxied bean.
    fn bean_id(&self) -> &BeanId;

    /// Every capability the proxy implements, durability marker included.
    fn capabilities(&self) -> &CapabilitySet;

    /// Handler the proxy forwards through.
    fn handler(&self) -> &Arc<dyn MethodHandler>;

    /// The instance a call made now would reach.
    fn target(&self) -> hive_core::Result<Instance> {
        self.handler().target()
    }

    /// Whether the proxy implements the named capability.
    fn implements(&self, name: &str) -> bool {
        self.capabilities().iter().any(|c| c.name() == name)
    }
}

impl dyn ClientProxy {
    /// Resolve the current instance as a `T`.
    ///
    /// `Ok(None)` when the instance is of a different type.
    pub fn downcast_target<T: Any + Send + Sync>(&self) -> hive_core::Result<Option<Arc<T>>> {
        Ok(self.target()?.downcast::<T>().ok())
    }
}

/// A synthesized proxy type, ready to be bound to a handler.
pub trait ProxyClass: Send + Sync {
    /// Capabilities the class implements.
    fn capabilities(&self) -> &CapabilitySet;

    /// Create a proxy object forwarding through `handler`.
    fn instantiate(&self, handler: Arc<dyn MethodHandler>) -> Result<Arc<dyn ClientProxy>, BoxError>;
}

/// Synthesizes proxy classes for capability sets.
pub trait DispatchGenerator: Send + Sync {
    /// Produce a class implementing exactly `capabilities`.
    fn synthesize(&self, capabilities: &CapabilitySet) -> Result<Arc<dyn ProxyClass>, BoxError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Forward-by-identity handler
// ─────────────────────────────────────────────────────────────────────────────

/// Handler that looks the bean's instance up through the resolver on every
/// call instead of capturing it, so a proxy survives its scope being left
/// and re-entered.
pub struct ContextualMethodHandler {
    bean: Arc<dyn Contextual>,
    index: usize,
    resolver: Arc<dyn InstanceResolver>,
}

impl ContextualMethodHandler {
    /// Create a handler for the bean at `index`.
    pub fn new(bean: Arc<dyn Contextual>, index: usize, resolver: Arc<dyn InstanceResolver>) -> Self {
        Self { bean, index, resolver }
    }
}

impl MethodHandler for ContextualMethodHandler {
    fn bean(&self) -> &Arc<dyn Contextual> {
        &self.bean
    }

    fn index(&self) -> usize {
        self.index
    }

    fn target(&self) -> hive_core::Result<Instance> {
        self.resolver.resolve(&self.bean)
    }
}

impl fmt::Debug for ContextualMethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualMethodHandler")
            .field("bean", self.bean.id())
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in generator
// ─────────────────────────────────────────────────────────────────────────────

/// Why the built-in generator rejected a capability set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardingError {
    /// A declared type cannot be extended.
    #[error("cannot proxy sealed type {0}")]
    SealedType(String),
}

/// Generator producing trait-object forwarding proxies.
///
/// Classes are cached per capability set; beans declaring the same types
/// share one class.
#[derive(Default)]
pub struct ForwardingGenerator {
    classes: DashMap<CapabilitySet, Arc<ForwardingClass>>,
}

impl ForwardingGenerator {
    /// Create a generator with an empty class cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct classes synthesized so far.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

impl DispatchGenerator for ForwardingGenerator {
    fn synthesize(&self, capabilities: &CapabilitySet) -> Result<Arc<dyn ProxyClass>, BoxError> {
        if let Some(sealed) = capabilities
            .iter()
            .find(|c| c.kind() == CapabilityKind::Sealed)
        {
            return Err(Box::new(ForwardingError::SealedType(sealed.name().to_string())));
        }
        let class = self
            .classes
            .entry(capabilities.clone())
            .or_insert_with(|| {
                debug!(capabilities = capabilities.len(), "synthesizing forwarding class");
                Arc::new(ForwardingClass {
                    capabilities: capabilities.clone(),
                })
            })
            .clone();
        Ok(class)
    }
}

impl fmt::Debug for ForwardingGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingGenerator")
            .field("class_count", &self.classes.len())
            .finish()
    }
}

/// Class synthesized by [`ForwardingGenerator`].
#[derive(Debug)]
pub struct ForwardingClass {
    capabilities: CapabilitySet,
}

impl ProxyClass for ForwardingClass {
    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn instantiate(&self, handler: Arc<dyn MethodHandler>) -> Result<Arc<dyn ClientProxy>, BoxError> {
        Ok(Arc::new(ForwardingProxy {
            bean_id: handler.bean().id().clone(),
            capabilities: self.capabilities.clone(),
            handler,
        }))
    }
}

/// Proxy object produced by [`ForwardingClass`].
#[derive(Debug)]
pub struct ForwardingProxy {
    bean_id: BeanId,
    capabilities: CapabilitySet,
    handler: Arc<dyn MethodHandler>,
}

impl ClientProxy for ForwardingProxy {
    fn bean_id(&self) -> &BeanId {
        &self.bean_id
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn handler(&self) -> &Arc<dyn MethodHandler> {
        &self.handler
    }
}
