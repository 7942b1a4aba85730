//! Bean registration table.
//!
//! Built once at startup by an external loader and frozen behind an `Arc`.
//! Registration order is preserved: a bean's index is stable for the life of
//! the container and is what client proxies carry alongside the bean itself.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::bean::{BeanId, Contextual};
use crate::errors::DefinitionError;

/// Ordered table of every bean the container knows about.
#[derive(Default)]
pub struct BeanRegistry {
    beans: Vec<Arc<dyn Contextual>>,
    index: HashMap<BeanId, usize>,
}

impl BeanRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bean and return its index.
    ///
    /// Ids must be unique; a second registration under the same id is a
    /// definition error rather than a silent replacement.
    pub fn register(&mut self, bean: Arc<dyn Contextual>) -> Result<usize, DefinitionError> {
        let id = bean.id().clone();
        if self.index.contains_key(&id) {
            return Err(DefinitionError::DuplicateBean(id));
        }
        let position = self.beans.len();
        debug!(bean = %id, scope = %bean.scope(), index = position, "registering bean");
        let _ = self.index.insert(id, position);
        self.beans.push(bean);
        Ok(position)
    }

    /// Index of a bean, or `None` if it is not registered.
    #[must_use]
    pub fn index_of(&self, id: &BeanId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Look up a bean by id.
    #[must_use]
    pub fn get(&self, id: &BeanId) -> Option<&Arc<dyn Contextual>> {
        self.index_of(id).and_then(|i| self.beans.get(i))
    }

    /// Look up a bean by id, failing with a [`DefinitionError`] if unknown.
    pub fn require(&self, id: &BeanId) -> Result<&Arc<dyn Contextual>, DefinitionError> {
        self.get(id)
            .ok_or_else(|| DefinitionError::UnknownBean(id.clone()))
    }

    /// Look up a bean by index.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&Arc<dyn Contextual>> {
        self.beans.get(index)
    }

    /// Whether a bean with this id is registered.
    #[must_use]
    pub fn contains(&self, id: &BeanId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of registered beans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beans.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    /// Iterate beans in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Contextual>> {
        self.beans.iter()
    }
}

impl std::fmt::Debug for BeanRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanRegistry")
            .field("bean_count", &self.len())
            .finish()
    }
}
