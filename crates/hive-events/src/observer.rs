//! Events and the listener capability.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use hive_core::BoxError;

/// Identity of an event type. Observers are registered and resolved per type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(Arc<str>);

impl EventType {
    /// Create an event type from its name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A fired event: its type plus an opaque payload.
#[derive(Clone)]
pub struct Event {
    event_type: EventType,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Event {
    /// Wrap a payload.
    pub fn new<T: Any + Send + Sync>(event_type: impl Into<EventType>, payload: T) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Arc::new(payload),
        }
    }

    /// The event's type.
    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// The payload as a `T`, if it is one.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

/// When, relative to the enclosing unit of work, an observer is notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionPhase {
    /// Immediately, while the event is being fired.
    InProgress,
    /// Just before the unit of work completes, whatever the outcome.
    BeforeCompletion,
    /// After the unit of work completes, whatever the outcome.
    AfterCompletion,
    /// After the unit of work completes successfully.
    AfterSuccess,
    /// After the unit of work fails.
    AfterFailure,
}

impl TransactionPhase {
    /// Every phase.
    pub fn all() -> &'static [TransactionPhase] {
        &[
            Self::InProgress,
            Self::BeforeCompletion,
            Self::AfterCompletion,
            Self::AfterSuccess,
            Self::AfterFailure,
        ]
    }

    /// Whether observers of this phase run at fire time.
    pub fn is_immediate(self) -> bool {
        self == Self::InProgress
    }

    /// Whether a deferred observer of this phase runs for `outcome`.
    pub fn fires_on(self, outcome: Outcome) -> bool {
        match self {
            Self::InProgress | Self::BeforeCompletion | Self::AfterCompletion => true,
            Self::AfterSuccess => outcome == Outcome::Success,
            Self::AfterFailure => outcome == Outcome::Failure,
        }
    }
}

/// How a unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Committed.
    Success,
    /// Rolled back or aborted.
    Failure,
}

/// An event listener.
pub trait Observer: Send + Sync {
    /// Stable identity. Two observers with the same id are the same listener.
    fn id(&self) -> &str;

    /// Dispatch phase.
    fn phase(&self) -> TransactionPhase;

    /// Handle an event.
    fn notify(&self, event: &Event) -> Result<(), BoxError>;
}

impl fmt::Debug for dyn Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id())
            .field("phase", &self.phase())
            .finish()
    }
}
