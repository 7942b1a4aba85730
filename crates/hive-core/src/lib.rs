//! # hive-core
//!
//! Foundation types shared by every Hive crate.
//!
//! - [`scope`]: the six built-in scope kinds
//! - [`bean`]: bean identities, capability sets, and the [`Contextual`](bean::Contextual)
//!   capability implemented by managed objects
//! - [`registry`]: the explicit, startup-built registration table
//! - [`ids`]: branded identifiers for units of work (request, session, conversation)
//! - [`errors`]: the error hierarchy and [`ErrorCollector`](errors::ErrorCollector)
//! - [`service`]: seams between crates ([`ContainerService`](service::ContainerService),
//!   [`InstanceResolver`](service::InstanceResolver))
//! - [`logging`]: `tracing` subscriber setup and test capture utilities

#![deny(unsafe_code)]

pub mod bean;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod registry;
pub mod scope;
pub mod service;

pub use bean::{
    BeanId, BoxError, Capability, CapabilityKind, CapabilitySet, Contextual, DEFAULT_DURABLE_MARKER,
    Instance,
};
pub use errors::{
    ContainerError, ContextError, DefinitionError, DestructionError, ErrorCollector,
    LifecycleError, ProxyConstructionError, Result, SharedError,
};
pub use ids::{ConversationId, RequestId, SessionId};
pub use registry::BeanRegistry;
pub use scope::ScopeKind;
pub use service::{ContainerService, InstanceResolver};
