//! Bean identities and the contextual-object capability.
//!
//! A *bean* is the container's definition of a managed object: a stable
//! [`BeanId`], the [`ScopeKind`] it lives in, the [`CapabilitySet`] its
//! references must appear to implement, and the create/destroy callbacks.
//! Bean metadata is supplied by an external loader through the
//! [`BeanRegistry`](crate::registry::BeanRegistry); nothing in the core
//! inspects type metadata at runtime.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::scope::ScopeKind;

/// Boxed error returned by externally supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A live contextual instance. Opaque to the core; callers downcast.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Stable identity of a bean.
///
/// Cheap to clone; equal ids always refer to the same bean regardless of
/// which scope is asking.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BeanId(Arc<str>);

impl BeanId {
    /// Create an id from its string form.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Borrow the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BeanId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BeanId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Serialize for BeanId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BeanId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// How a declared type may be implemented by a generated proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    /// A pure interface: always proxyable.
    Interface,
    /// A concrete, extensible type.
    Class,
    /// A concrete type that cannot be extended (final/sealed).
    Sealed,
}

/// One type a bean's references must appear to implement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    name: String,
    kind: CapabilityKind,
}

impl Capability {
    /// An interface capability.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CapabilityKind::Interface,
        }
    }

    /// An extensible class capability.
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CapabilityKind::Class,
        }
    }

    /// A sealed class capability.
    pub fn sealed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CapabilityKind::Sealed,
        }
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extension kind.
    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Marker capability every client proxy carries unless configured otherwise.
/// Signals that a reference may be held across scope boundaries.
pub const DEFAULT_DURABLE_MARKER: &str = "hive::Durable";

/// The set of types a reference must appear to implement. Ordered so that
/// generated proxy classes are deterministic.
pub type CapabilitySet = BTreeSet<Capability>;

/// A managed object definition.
///
/// Implemented by whatever loader builds the registration table. The core
/// only calls these methods; it never constructs beans itself.
pub trait Contextual: Send + Sync + fmt::Debug {
    /// Stable identity, used as the key in bean stores and the proxy pool.
    fn id(&self) -> &BeanId;

    /// The scope instances of this bean live in.
    fn scope(&self) -> ScopeKind;

    /// Declared types. Proxies implement exactly these plus the durability marker.
    fn capabilities(&self) -> CapabilitySet;

    /// Construct a new instance.
    fn create_instance(&self) -> Result<Instance, BoxError>;

    /// Release an instance previously returned by [`create_instance`](Contextual::create_instance).
    fn destroy_instance(&self, instance: Instance) -> Result<(), BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bean_id_equality_is_by_value() {
        let a = BeanId::new("orders");
        let b = BeanId::from("orders".to_string());
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "orders");
        assert_eq!(a.to_string(), "orders");
    }

    #[test]
    fn bean_id_serde_is_transparent() {
        let id = BeanId::new("cart");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"cart\"");
        let parsed: BeanId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn capability_constructors_set_kind() {
        assert_eq!(Capability::interface("Greeter").kind(), CapabilityKind::Interface);
        assert_eq!(Capability::class("Base").kind(), CapabilityKind::Class);
        assert_eq!(Capability::sealed("Final").kind(), CapabilityKind::Sealed);
    }

    #[test]
    fn capability_set_is_ordered_and_deduplicated() {
        let mut set = CapabilitySet::new();
        let _ = set.insert(Capability::interface("Zeta"));
        let _ = set.insert(Capability::interface("Alpha"));
        let _ = set.insert(Capability::interface("Alpha"));
        let names: Vec<_> = set.iter().map(Capability::name).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }
}
