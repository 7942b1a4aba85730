//! # hive-proxy
//!
//! Client proxies for scope-crossing references.
//!
//! A bean in a normal scope is never handed out directly: callers get a
//! [`ClientProxy`] that resolves the bean's current instance on every call.
//! The [`ProxyPool`] guarantees one proxy per bean for the container's
//! lifetime, constructed through a pluggable [`DispatchGenerator`].

#![deny(unsafe_code)]

pub mod dispatch;
pub mod pool;

pub use dispatch::{
    ClientProxy, ContextualMethodHandler, DispatchGenerator, ForwardingClass, ForwardingError,
    ForwardingGenerator, ForwardingProxy, MethodHandler, ProxyClass,
};
pub use pool::ProxyPool;
