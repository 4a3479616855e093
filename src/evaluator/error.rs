// Error types for FHIRPath evaluation

use thiserror::Error;

/// Result type for evaluation operations
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Errors that can occur during FHIRPath evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Unknown function name
    #[error("Unknown function '{name}'")]
    UnknownFunction {
        /// Function name
        name: String,
    },

    /// Function called with the wrong number or kind of arguments
    #[error("Invalid arguments for {function}(): {message}")]
    InvalidArguments {
        /// Function name
        function: String,
        /// What was wrong
        message: String,
    },

    /// Type error during evaluation
    #[error("Type error: expected {expected}, got {actual}")]
    TypeError {
        /// Expected type
        expected: String,
        /// Actual type found
        actual: String,
    },

    /// Operation needs a single item but got several
    #[error("{operation} requires a single item, got {count}")]
    NotSingleton {
        /// Operator or function that needed a singleton
        operation: String,
        /// Number of items found
        count: usize,
    },

    /// Property not found
    #[error("Property {property} not found on {resource_type}")]
    PropertyNotFound {
        /// Property name
        property: String,
        /// Resource type
        resource_type: String,
    },

    /// Variable not found
    #[error("Variable %{name} not found")]
    VariableNotFound {
        /// Variable name
        name: String,
    },

    /// Invalid operation
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Error message
        message: String,
    },
}
