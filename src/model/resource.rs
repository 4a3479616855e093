//! FHIR resource wrapper types

use serde_json::Value;
use std::sync::Arc;

/// A FHIR resource or complex element as seen by the expression evaluator
///
/// The JSON payload is shared, so cloning a resource while walking paths
/// does not copy the underlying document.
#[derive(Debug, Clone, PartialEq)]
pub struct FhirResource {
    /// The JSON representation of the resource
    data: Arc<Value>,
    /// Resource type, present only for top-level resources
    resource_type: Option<String>,
}

impl FhirResource {
    /// Create a new FHIR resource from JSON
    pub fn from_json(data: Value) -> Self {
        let resource_type = data
            .as_object()
            .and_then(|obj| obj.get("resourceType"))
            .and_then(|rt| rt.as_str())
            .map(str::to_string);

        Self {
            data: Arc::new(data),
            resource_type,
        }
    }

    /// Get the JSON representation
    pub fn to_json(&self) -> Value {
        self.data.as_ref().clone()
    }

    /// Get a reference to the JSON data
    pub fn as_json(&self) -> &Value {
        &self.data
    }

    /// Get the resource type if available
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// Whether this wraps a top-level resource rather than a nested element
    pub fn is_resource(&self) -> bool {
        self.resource_type.is_some()
    }

    /// Get a direct member of the wrapped object
    pub fn get_property(&self, name: &str) -> Option<&Value> {
        match self.data.as_ref() {
            Value::Object(obj) => obj.get(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_creation() {
        let json = json!({
            "resourceType": "Patient",
            "id": "Test-Patient",
            "gender": "female"
        });

        let resource = FhirResource::from_json(json.clone());
        assert_eq!(resource.resource_type(), Some("Patient"));
        assert!(resource.is_resource());
        assert_eq!(resource.to_json(), json);
    }

    #[test]
    fn test_property_access() {
        let resource = FhirResource::from_json(json!({
            "reference": "Patient/Test-Patient"
        }));

        assert!(!resource.is_resource());
        assert_eq!(
            resource.get_property("reference"),
            Some(&json!("Patient/Test-Patient"))
        );
        assert!(resource.get_property("display").is_none());
    }
}
