//! # hive-context
//!
//! Scope lifecycle for the Hive container.
//!
//! - [`store`]: the [`BeanStore`](store::BeanStore) storage capability and the
//!   default [`ConcurrentBeanStore`](store::ConcurrentBeanStore)
//! - [`context`]: one [`Context`](context::Context) per scope kind: an active
//!   flag, an attachable store, and the instance create/destroy policy.
//!   Unit-of-work scopes keep that state per calling thread.
//! - [`manager`]: the [`ContextManager`](manager::ContextManager) that owns all
//!   six contexts, drives begin/end/restore transitions and runs registered
//!   container services' cleanup when the application ends
//! - [`report`]: [`DestructionReport`](report::DestructionReport), the outcome
//!   of best-effort teardown
//!
//! ## Teardown model
//!
//! Destruction is best-effort. A failing or panicking destroy callback is
//! logged and recorded in the report; the remaining instances are still
//! destroyed and the scope is still deactivated.

#![deny(unsafe_code)]

pub mod context;
pub mod manager;
pub mod report;
pub mod store;

pub use context::Context;
pub use manager::ContextManager;
pub use report::DestructionReport;
pub use store::{BeanStore, ConcurrentBeanStore, ContextualInstance};
