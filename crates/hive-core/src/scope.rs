//! Built-in scope kinds.

use serde::{Deserialize, Serialize};

/// The lifetime bucket a managed object belongs to.
///
/// Application and Singleton live for the whole container; Session,
/// Conversation and Request cycle once per unit of work; Dependent instances
/// belong to whoever asked for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// One instance per container, held in the application store.
    Application,
    /// One instance per container, held in a container-owned store.
    Singleton,
    /// One instance per user session.
    Session,
    /// One instance per conversation within a session.
    Conversation,
    /// One instance per request.
    Request,
    /// A fresh instance per injection point, never shared.
    Dependent,
}

impl ScopeKind {
    /// Returns all scope kinds, outermost first.
    #[must_use]
    pub fn all() -> &'static [ScopeKind] {
        &[
            Self::Application,
            Self::Singleton,
            Self::Session,
            Self::Conversation,
            Self::Request,
            Self::Dependent,
        ]
    }

    /// Returns `true` for scopes whose instances are reached through a client
    /// proxy when injected across scope boundaries.
    ///
    /// Singleton and Dependent are pseudo-scopes: references to them are
    /// handed out directly.
    #[must_use]
    pub fn is_normal(self) -> bool {
        !matches!(self, Self::Singleton | Self::Dependent)
    }

    /// Returns `true` for scopes whose state belongs to one unit of work.
    ///
    /// Each thread driving a unit of work sees its own active flag and store
    /// for these scopes. Application and Singleton state is shared by every
    /// thread in the container.
    #[must_use]
    pub fn is_unit_of_work(self) -> bool {
        matches!(
            self,
            Self::Session | Self::Conversation | Self::Request | Self::Dependent
        )
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Application => write!(f, "application"),
            Self::Singleton => write!(f, "singleton"),
            Self::Session => write!(f, "session"),
            Self::Conversation => write!(f, "conversation"),
            Self::Request => write!(f, "request"),
            Self::Dependent => write!(f, "dependent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_scopes() {
        assert!(ScopeKind::Application.is_normal());
        assert!(ScopeKind::Session.is_normal());
        assert!(ScopeKind::Conversation.is_normal());
        assert!(ScopeKind::Request.is_normal());
        assert!(!ScopeKind::Singleton.is_normal());
        assert!(!ScopeKind::Dependent.is_normal());
    }

    #[test]
    fn unit_of_work_classification() {
        let per_unit: Vec<_> = ScopeKind::all()
            .iter()
            .filter(|s| s.is_unit_of_work())
            .collect();
        assert_eq!(
            per_unit,
            vec![
                &ScopeKind::Session,
                &ScopeKind::Conversation,
                &ScopeKind::Request,
                &ScopeKind::Dependent
            ]
        );
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(ScopeKind::Conversation.to_string(), "conversation");
        assert_eq!(ScopeKind::Dependent.to_string(), "dependent");
    }

    #[test]
    fn serde_matches_display() {
        for scope in ScopeKind::all() {
            let json = serde_json::to_string(scope).unwrap();
            assert_eq!(json, format!("\"{scope}\""));
            let parsed: ScopeKind = serde_json::from_str(&json).unwrap();
            assert_eq!(*scope, parsed);
        }
    }
}
