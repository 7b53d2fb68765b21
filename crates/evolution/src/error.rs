//! Error types for rule evolution operations.

use std::fmt;

/// Kind of record an id failed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Rule,
    Mutation,
    Candidate,
    Test,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Rule => write!(f, "rule"),
            EntityKind::Mutation => write!(f, "mutation"),
            EntityKind::Candidate => write!(f, "candidate"),
            EntityKind::Test => write!(f, "test"),
        }
    }
}

/// Errors surfaced by the evolution engine and its repositories.
///
/// Any error aborts only the requested operation; state owned by other rules
/// is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    /// A rule, mutation, candidate or test id did not resolve.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The requested transition is not legal from the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed input (out-of-range confidence or metric, bad identity).
    #[error("Validation error: {0}")]
    Validation(String),
}

impl EvolutionError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        EvolutionError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EvolutionError::NotFound { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, EvolutionError::InvalidState(_))
    }
}

/// Result alias for evolution operations.
pub type Result<T> = std::result::Result<T, EvolutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = EvolutionError::not_found(EntityKind::Candidate, "abc");
        assert_eq!(err.to_string(), "candidate not found: abc");
        assert!(err.is_not_found());
        assert!(!err.is_invalid_state());
    }
}
