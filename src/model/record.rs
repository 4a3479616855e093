//! The closed set of clinical record kinds and their JSON codec

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::careplan::CarePlan;
use super::clinical::{Encounter, Patient};
use super::definition::{ActivityDefinition, PlanDefinition};
use super::error::{ModelError, Result};
use super::resource::FhirResource;

/// Resource kind a record is keyed under in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Patient
    Patient,
    /// Encounter
    Encounter,
    /// PlanDefinition
    PlanDefinition,
    /// ActivityDefinition
    ActivityDefinition,
    /// CarePlan
    CarePlan,
    /// Any other resource type, kept opaque
    Other(String),
}

impl ResourceKind {
    /// The FHIR `resourceType` name
    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Patient => "Patient",
            ResourceKind::Encounter => "Encounter",
            ResourceKind::PlanDefinition => "PlanDefinition",
            ResourceKind::ActivityDefinition => "ActivityDefinition",
            ResourceKind::CarePlan => "CarePlan",
            ResourceKind::Other(name) => name,
        }
    }
}

impl From<&str> for ResourceKind {
    fn from(name: &str) -> Self {
        match name {
            "Patient" => ResourceKind::Patient,
            "Encounter" => ResourceKind::Encounter,
            "PlanDefinition" => ResourceKind::PlanDefinition,
            "ActivityDefinition" => ResourceKind::ActivityDefinition,
            "CarePlan" => ResourceKind::CarePlan,
            other => ResourceKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check an id against the FHIR id grammar `[A-Za-z0-9\-\.]{1,64}`
pub fn validate_id(id: &str) -> Result<()> {
    let valid = (1..=64).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.');
    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidId { id: id.to_string() })
    }
}

/// A clinical record of one of the known kinds, or an opaque fallback
#[derive(Debug, Clone, PartialEq)]
pub enum ClinicalRecord {
    /// Patient
    Patient(Patient),
    /// Encounter
    Encounter(Encounter),
    /// PlanDefinition
    PlanDefinition(PlanDefinition),
    /// ActivityDefinition
    ActivityDefinition(ActivityDefinition),
    /// CarePlan, usually one produced by plan generation
    CarePlan(CarePlan),
    /// Any other resource type
    Unknown {
        /// The `resourceType` member
        resource_type: String,
        /// Logical id
        id: String,
        /// Full JSON payload
        raw: Value,
    },
}

impl ClinicalRecord {
    /// Decode a FHIR R4 JSON resource
    pub fn from_json(value: Value) -> Result<Self> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(ModelError::NotAnObject {
                    actual: json_kind(&other),
                });
            }
        };

        let resource_type = match object.remove("resourceType") {
            Some(Value::String(resource_type)) => resource_type,
            _ => return Err(ModelError::MissingResourceType),
        };
        let id = match object.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => return Err(ModelError::MissingId { resource_type }),
        };
        validate_id(&id)?;

        let members = Value::Object(object);
        let record = match ResourceKind::from(resource_type.as_str()) {
            ResourceKind::Patient => ClinicalRecord::Patient(decode(&resource_type, members)?),
            ResourceKind::Encounter => ClinicalRecord::Encounter(decode(&resource_type, members)?),
            ResourceKind::PlanDefinition => {
                ClinicalRecord::PlanDefinition(decode(&resource_type, members)?)
            }
            ResourceKind::ActivityDefinition => {
                ClinicalRecord::ActivityDefinition(decode(&resource_type, members)?)
            }
            ResourceKind::CarePlan => ClinicalRecord::CarePlan(decode(&resource_type, members)?),
            ResourceKind::Other(_) => {
                let mut raw = match members {
                    Value::Object(object) => object,
                    _ => Map::new(),
                };
                raw.insert(
                    "resourceType".to_string(),
                    Value::String(resource_type.clone()),
                );
                ClinicalRecord::Unknown {
                    resource_type,
                    id,
                    raw: Value::Object(raw),
                }
            }
        };
        Ok(record)
    }

    /// Decode FHIR R4 JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(value)
    }

    /// Encode as FHIR R4 JSON
    pub fn to_json(&self) -> Value {
        let encoded = match self {
            ClinicalRecord::Patient(patient) => serde_json::to_value(patient),
            ClinicalRecord::Encounter(encounter) => serde_json::to_value(encounter),
            ClinicalRecord::PlanDefinition(plan) => serde_json::to_value(plan),
            ClinicalRecord::ActivityDefinition(activity) => serde_json::to_value(activity),
            ClinicalRecord::CarePlan(care_plan) => serde_json::to_value(care_plan),
            ClinicalRecord::Unknown { raw, .. } => return raw.clone(),
        };

        // Maps with string keys always serialize
        let mut object = match encoded {
            Ok(Value::Object(object)) => object,
            _ => Map::new(),
        };
        object.insert(
            "resourceType".to_string(),
            Value::String(self.resource_type().to_string()),
        );
        Value::Object(object)
    }

    /// Encode as compact JSON text
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// The record's kind
    pub fn kind(&self) -> ResourceKind {
        match self {
            ClinicalRecord::Patient(_) => ResourceKind::Patient,
            ClinicalRecord::Encounter(_) => ResourceKind::Encounter,
            ClinicalRecord::PlanDefinition(_) => ResourceKind::PlanDefinition,
            ClinicalRecord::ActivityDefinition(_) => ResourceKind::ActivityDefinition,
            ClinicalRecord::CarePlan(_) => ResourceKind::CarePlan,
            ClinicalRecord::Unknown { resource_type, .. } => {
                ResourceKind::Other(resource_type.clone())
            }
        }
    }

    /// The `resourceType` name
    pub fn resource_type(&self) -> &str {
        match self {
            ClinicalRecord::Patient(_) => "Patient",
            ClinicalRecord::Encounter(_) => "Encounter",
            ClinicalRecord::PlanDefinition(_) => "PlanDefinition",
            ClinicalRecord::ActivityDefinition(_) => "ActivityDefinition",
            ClinicalRecord::CarePlan(_) => "CarePlan",
            ClinicalRecord::Unknown { resource_type, .. } => resource_type,
        }
    }

    /// Logical id
    pub fn id(&self) -> &str {
        match self {
            ClinicalRecord::Patient(patient) => &patient.id,
            ClinicalRecord::Encounter(encounter) => &encounter.id,
            ClinicalRecord::PlanDefinition(plan) => &plan.id,
            ClinicalRecord::ActivityDefinition(activity) => &activity.id,
            ClinicalRecord::CarePlan(care_plan) => &care_plan.id,
            ClinicalRecord::Unknown { id, .. } => id,
        }
    }

    /// Canonical url of definition resources
    pub fn url(&self) -> Option<&str> {
        match self {
            ClinicalRecord::PlanDefinition(plan) => plan.url.as_deref(),
            ClinicalRecord::ActivityDefinition(activity) => activity.url.as_deref(),
            ClinicalRecord::Unknown { raw, .. } => raw.get("url").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Business version of definition resources
    pub fn version(&self) -> Option<&str> {
        match self {
            ClinicalRecord::PlanDefinition(plan) => plan.version.as_deref(),
            ClinicalRecord::ActivityDefinition(activity) => activity.version.as_deref(),
            ClinicalRecord::Unknown { raw, .. } => raw.get("version").and_then(Value::as_str),
            _ => None,
        }
    }

    /// View the record as an expression-evaluation input
    pub fn to_resource(&self) -> FhirResource {
        FhirResource::from_json(self.to_json())
    }
}

impl FromStr for ClinicalRecord {
    type Err = ModelError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_json_str(text)
    }
}

impl TryFrom<Value> for ClinicalRecord {
    type Error = ModelError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(value)
    }
}

impl From<Patient> for ClinicalRecord {
    fn from(patient: Patient) -> Self {
        ClinicalRecord::Patient(patient)
    }
}

impl From<Encounter> for ClinicalRecord {
    fn from(encounter: Encounter) -> Self {
        ClinicalRecord::Encounter(encounter)
    }
}

impl From<PlanDefinition> for ClinicalRecord {
    fn from(plan: PlanDefinition) -> Self {
        ClinicalRecord::PlanDefinition(plan)
    }
}

impl From<ActivityDefinition> for ClinicalRecord {
    fn from(activity: ActivityDefinition) -> Self {
        ClinicalRecord::ActivityDefinition(activity)
    }
}

impl From<CarePlan> for ClinicalRecord {
    fn from(care_plan: CarePlan) -> Self {
        ClinicalRecord::CarePlan(care_plan)
    }
}

fn decode<T: serde::de::DeserializeOwned>(resource_type: &str, members: Value) -> Result<T> {
    serde_json::from_value(members).map_err(|error| ModelError::decode(resource_type, error))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
