//! Error types for the resource codec

use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while decoding or validating clinical records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The JSON text could not be parsed at all
    #[error("Malformed JSON: {message}")]
    MalformedJson {
        /// Parser message
        message: String,
    },

    /// The payload is not a JSON object
    #[error("Expected a JSON object, got {actual}")]
    NotAnObject {
        /// JSON kind that was found instead
        actual: &'static str,
    },

    /// The `resourceType` member is absent or not a string
    #[error("Missing resourceType")]
    MissingResourceType,

    /// The `id` member is absent
    #[error("{resource_type} has no id")]
    MissingId {
        /// Resource type of the offending record
        resource_type: String,
    },

    /// The id does not follow the FHIR id grammar
    #[error("Invalid id '{id}': expected 1-64 characters from [A-Za-z0-9-.]")]
    InvalidId {
        /// The rejected id
        id: String,
    },

    /// The members do not fit the resource kind
    #[error("Invalid {resource_type}: {message}")]
    Decode {
        /// Resource type being decoded
        resource_type: String,
        /// Decoder message
        message: String,
    },
}

impl ModelError {
    pub(crate) fn decode(resource_type: &str, error: serde_json::Error) -> Self {
        Self::Decode {
            resource_type: resource_type.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(error: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: error.to_string(),
        }
    }
}
