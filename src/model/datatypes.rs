//! Shared FHIR data types used by the clinical records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A reference to another resource, e.g. `{"reference": "Patient/123"}`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reference {
    /// Relative, absolute or fragment reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Text alternative for the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reference {
    /// Build a relative reference `<ResourceType>/<id>`
    pub fn to(resource_type: &str, id: &str) -> Self {
        Self {
            reference: Some(format!("{resource_type}/{id}")),
            ..Default::default()
        }
    }

    /// The id part of a relative or absolute reference of the given type
    ///
    /// `Patient/123`, `http://host/fhir/Patient/123` and
    /// `Patient/123/_history/2` all yield `123` for `Patient`.
    pub fn reference_id(&self, resource_type: &str) -> Option<&str> {
        let reference = self.reference.as_deref()?;
        let segments: Vec<&str> = reference.split('/').collect();
        segments
            .windows(2)
            .rev()
            .find(|pair| pair[0] == resource_type)
            .map(|pair| pair[1])
            .filter(|id| !id.is_empty())
    }
}

/// A code defined by a terminology system
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Coding {
    /// Identity of the terminology system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Symbol in syntax defined by the system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Representation defined by the system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Concept, usually a list of codings plus text
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodeableConcept {
    /// Code defined by a terminology system
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    /// Plain text representation of the concept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
