//! Patient and Encounter records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::datatypes::Reference;

/// Demographics of a person receiving care
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Logical id
    pub id: String,

    /// Whether this patient record is in active use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    /// male | female | other | unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    /// Date of birth, kept as the FHIR date string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    /// Members not modelled here (name, telecom, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Patient {
    /// A patient with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: None,
            gender: None,
            birth_date: None,
            extra: Map::new(),
        }
    }
}

/// An interaction between a patient and a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    /// Logical id
    pub id: String,

    /// planned | arrived | triaged | in-progress | onleave | finished | cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// The patient present at the encounter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Encounter {
    /// Id of the patient this encounter refers to, if it refers to one
    pub fn subject_patient_id(&self) -> Option<&str> {
        self.subject.as_ref()?.reference_id("Patient")
    }
}
