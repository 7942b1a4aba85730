//! # hive-events
//!
//! Observer resolution and phased event delivery.
//!
//! - [`observer`]: [`Event`], [`EventType`], the [`Observer`] capability and
//!   its [`TransactionPhase`]
//! - [`resolved`]: [`ResolvedObservers`], one event type's listeners split
//!   into immediate and deferred groups
//! - [`cache`]: [`ObserverResolutionCache`], partitions cached per event type
//! - [`registry`]: [`ObserverRegistry`], the explicit type → listeners table
//! - [`notifier`]: [`EventNotifier`] and the [`DeferredEvents`] buffer

#![deny(unsafe_code)]

pub mod cache;
pub mod notifier;
pub mod observer;
pub mod registry;
pub mod resolved;

pub use cache::ObserverResolutionCache;
pub use notifier::{DeferredEvents, Delivery, EventNotifier};
pub use observer::{Event, EventType, Observer, Outcome, TransactionPhase};
pub use registry::ObserverRegistry;
pub use resolved::{ObserverSet, ResolvedObservers};
