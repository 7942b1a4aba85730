//! Error hierarchy for the Hive container.
//!
//! - [`LifecycleError`]: container lifecycle invoked out of order. Fatal for
//!   the current unit of work.
//! - [`ContextError`]: a scope was asked for an instance while unusable, or
//!   the bean's create callback failed.
//! - [`DefinitionError`]: a bean is unknown to the authoritative registry.
//! - [`ProxyConstructionError`]: the dispatch generator could not synthesize
//!   or instantiate a client proxy. Carries the generator's cause.
//! - [`DestructionError`]: a destroy callback failed. Always contained by the
//!   caller and collected with [`ErrorCollector`].
//! - [`ContainerError`]: umbrella enum with `From` conversions.
//!
//! None of these are retried by the core: lifecycle and definition errors are
//! programmer errors, and proxy generation is deterministic.

use thiserror::Error;

use crate::bean::{BeanId, BoxError};
use crate::scope::ScopeKind;

/// Convenience alias used across the Hive crates.
pub type Result<T, E = ContainerError> = std::result::Result<T, E>;

// ─────────────────────────────────────────────────────────────────────────────
// Domain errors
// ─────────────────────────────────────────────────────────────────────────────

/// Container lifecycle called out of order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// `begin_application` called twice without `end_application` in between.
    #[error("application scope is already active")]
    ApplicationAlreadyActive,

    /// A scope transition was attempted before `begin_application`.
    #[error("{operation} called before the application scope was started")]
    ApplicationNotActive {
        /// The transition that was rejected.
        operation: &'static str,
    },
}

/// A scope could not serve an instance.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The scope is not active on this unit of work.
    #[error("no active context for scope {0}")]
    NotActive(ScopeKind),

    /// The scope is active but has no backing store attached.
    #[error("context for scope {0} has no bean store attached")]
    MissingStore(ScopeKind),

    /// The bean's create callback failed.
    #[error("failed to create instance of {bean}")]
    Creation {
        /// Bean being created.
        bean: BeanId,
        /// Callback failure.
        #[source]
        source: BoxError,
    },
}

/// A bean reference cannot be satisfied from the registration table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// The bean is not in the authoritative registry.
    #[error("{0} is not known to the container")]
    UnknownBean(BeanId),

    /// Two definitions were registered under the same id.
    #[error("bean {0} is already registered")]
    DuplicateBean(BeanId),
}

/// Client proxy generation failed.
///
/// Cloneable so that one failed construction can be reported to every caller
/// that asks for the same proxy.
#[derive(Debug, Clone, Error)]
pub enum ProxyConstructionError {
    /// The generator could not synthesize a proxy class for the capability set.
    #[error("could not generate client proxy class for {bean}")]
    Synthesis {
        /// Bean being proxied.
        bean: BeanId,
        /// Generator failure.
        #[source]
        source: SharedError,
    },

    /// The class was synthesized but could not be instantiated.
    #[error("could not instantiate client proxy for {bean}")]
    Instantiation {
        /// Bean being proxied.
        bean: BeanId,
        /// Instantiation failure.
        #[source]
        source: SharedError,
    },
}

/// A callback failure that may be handed to more than one caller.
pub type SharedError = std::sync::Arc<dyn std::error::Error + Send + Sync>;

/// A destroy callback failed.
#[derive(Debug, Error)]
pub enum DestructionError {
    /// The callback returned an error.
    #[error("failed to destroy instance of {bean} in {scope} scope")]
    Failed {
        /// Bean whose instance was being destroyed.
        bean: BeanId,
        /// Scope being torn down.
        scope: ScopeKind,
        /// Callback failure.
        #[source]
        source: BoxError,
    },

    /// The callback panicked.
    #[error("destroy callback for {bean} in {scope} scope panicked: {message}")]
    Panicked {
        /// Bean whose instance was being destroyed.
        bean: BeanId,
        /// Scope being torn down.
        scope: ScopeKind,
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl DestructionError {
    /// The bean whose destruction failed.
    pub fn bean(&self) -> &BeanId {
        match self {
            Self::Failed { bean, .. } | Self::Panicked { bean, .. } => bean,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Umbrella error
// ─────────────────────────────────────────────────────────────────────────────

/// Any error surfaced by the container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Lifecycle ordering violation.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Scope could not serve an instance.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Unknown or duplicate bean.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Proxy generation failure.
    #[error(transparent)]
    ProxyConstruction(#[from] ProxyConstructionError),

    /// Destroy callback failure.
    #[error(transparent)]
    Destruction(#[from] DestructionError),

    /// A container service's cleanup hook panicked.
    #[error("cleanup of service {service} panicked: {message}")]
    Cleanup {
        /// Service name.
        service: String,
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl ContainerError {
    /// Fatal errors mean the current unit of work must not continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Lifecycle(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Lifecycle(_) => "lifecycle",
            Self::Context(ContextError::NotActive(_)) => "context_not_active",
            Self::Context(ContextError::MissingStore(_)) => "missing_store",
            Self::Context(ContextError::Creation { .. }) => "creation_failed",
            Self::Definition(_) => "definition",
            Self::ProxyConstruction(_) => "proxy_construction",
            Self::Destruction(_) => "destruction",
            Self::Cleanup { .. } => "cleanup",
        }
    }
}

/// Render a panic payload for error messages.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ErrorCollector
// ─────────────────────────────────────────────────────────────────────────────

/// Collects errors from best-effort operations without aborting them.
///
/// Scope teardown destroys every instance even if some destroy callbacks
/// fail; the failures end up here.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<ContainerError>,
}

impl ErrorCollector {
    /// Create a new empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn collect(&mut self, error: impl Into<ContainerError>) {
        self.errors.push(error.into());
    }

    /// Move every error out of another collector into this one.
    pub fn absorb(&mut self, other: ErrorCollector) {
        self.errors.extend(other.errors);
    }

    /// Whether any errors have been collected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of collected errors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.errors.len()
    }

    /// View collected errors.
    #[must_use]
    pub fn errors(&self) -> &[ContainerError] {
        &self.errors
    }

    /// Take all collected errors, leaving the collector empty.
    pub fn flush(&mut self) -> Vec<ContainerError> {
        std::mem::take(&mut self.errors)
    }
}
