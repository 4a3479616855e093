//! Clinical records and FHIRPath value types
//!
//! The record types are a closed set of FHIR R4 kinds with an opaque fallback;
//! members the types do not model are preserved through JSON round trips.

pub mod careplan;
pub mod clinical;
pub mod datatypes;
pub mod definition;
pub mod error;
pub mod record;
pub mod resource;
pub mod value;

pub use careplan::{ActivityDetail, CarePlan, CarePlanActivity, GeneratedPlan};
pub use clinical::{Encounter, Patient};
pub use datatypes::{CodeableConcept, Coding, Reference};
pub use definition::{
    ActionCondition, ActivityDefinition, ConditionKind, Expression, FHIRPATH_LANGUAGE,
    PlanAction, PlanDefinition,
};
pub use error::{ModelError, Result};
pub use record::{ClinicalRecord, ResourceKind, validate_id};
pub use resource::FhirResource;
pub use value::{Collection, FhirPathValue};
