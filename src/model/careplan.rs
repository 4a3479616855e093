//! CarePlan, the resource produced by plan generation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::datatypes::{CodeableConcept, Reference};

/// A care plan derived from a PlanDefinition for one patient and encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarePlan {
    /// Logical id, generated per invocation
    pub id: String,

    /// draft | active | on-hold | revoked | completed | entered-in-error | unknown
    pub status: String,

    /// proposal | plan | order | option
    pub intent: String,

    /// PlanDefinition canonicals this plan instantiates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instantiates_canonical: Vec<String>,

    /// Who the plan is for
    pub subject: Reference,

    /// Encounter the plan was created during
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,

    /// Date record was first recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// Planned activities, in action order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activity: Vec<CarePlanActivity>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The plan-generation output; a CarePlan by another name
pub type GeneratedPlan = CarePlan;

/// One planned activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarePlanActivity {
    /// In-line definition of the activity
    pub detail: ActivityDetail,

    /// Id of the PlanDefinition action this activity came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,

    /// Title of the PlanDefinition action this activity came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_title: Option<String>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// In-line description of a planned activity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetail {
    /// Kind of resource the activity produces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// ActivityDefinition canonicals this activity instantiates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instantiates_canonical: Vec<String>,

    /// Detail type of activity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    /// not-started | scheduled | in-progress | on-hold | completed | cancelled | ...
    pub status: String,

    /// Extra info describing the activity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Who the activity is for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    /// Encounter the activity was planned in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
