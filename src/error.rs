//! Error types for care-plan generation

use crate::model::{ModelError, ResourceKind};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CarePlanError>;

/// Errors surfaced by the store, the expression evaluator and plan generation
#[derive(Error, Debug)]
pub enum CarePlanError {
    /// A record with this kind and id already exists
    #[error("{kind}/{id} already exists")]
    DuplicateId {
        /// Resource kind
        kind: ResourceKind,
        /// Record id
        id: String,
    },

    /// No record with this kind and id
    #[error("{kind}/{id} not found")]
    NotFound {
        /// Resource kind
        kind: ResourceKind,
        /// Record id
        id: String,
    },

    /// Expression language other than FHIRPath
    #[error("Unsupported expression language '{language}'")]
    UnsupportedLanguage {
        /// The language tag that was given
        language: String,
    },

    /// The expression failed to parse or evaluate
    #[error("Evaluation of '{expression}' failed: {message}")]
    Evaluation {
        /// Expression text
        expression: String,
        /// Parser or evaluator message
        message: String,
    },

    /// A canonical reference that matches no stored definition
    #[error("Cannot resolve {kind} reference '{reference}'")]
    UnresolvedReference {
        /// Kind the reference should point to
        kind: ResourceKind,
        /// The canonical or reference text
        reference: String,
    },

    /// Malformed resource JSON or an invalid id
    #[error("Invalid resource: {0}")]
    InvalidResource(#[from] ModelError),

    /// Store I/O failure
    #[error("Storage error: {message}")]
    Storage {
        /// What the store was doing
        message: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A failure while processing one action of a PlanDefinition
    #[error("Action {action_path} of PlanDefinition/{plan_definition_id} failed: {source}")]
    ActionFailed {
        /// PlanDefinition id
        plan_definition_id: String,
        /// Index path of the action, e.g. `1` or `0.2`
        action_path: String,
        /// What went wrong
        #[source]
        source: Box<CarePlanError>,
    },
}

impl CarePlanError {
    /// Create a storage error
    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    /// Create an evaluation error
    pub fn evaluation(expression: &str, message: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.to_string(),
            message: message.into(),
        }
    }

    /// The error underneath any `ActionFailed` wrappers
    pub fn innermost(&self) -> &CarePlanError {
        match self {
            CarePlanError::ActionFailed { source, .. } => source.innermost(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innermost_unwraps_action_failures() {
        let error = CarePlanError::ActionFailed {
            plan_definition_id: "p1".to_string(),
            action_path: "0.1".to_string(),
            source: Box::new(CarePlanError::UnresolvedReference {
                kind: ResourceKind::ActivityDefinition,
                reference: "http://example.org/ActivityDefinition/missing".to_string(),
            }),
        };

        assert!(matches!(
            error.innermost(),
            CarePlanError::UnresolvedReference { .. }
        ));
        assert_eq!(
            error.to_string(),
            "Action 0.1 of PlanDefinition/p1 failed: Cannot resolve ActivityDefinition \
             reference 'http://example.org/ActivityDefinition/missing'"
        );
    }
}
