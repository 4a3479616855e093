//! Turning an ActivityDefinition into a planned activity

use crate::model::{
    ActivityDefinition, ActivityDetail, CarePlanActivity, PlanAction, Reference,
};
use serde_json::Map;

/// Status of every freshly planned activity
pub const INITIAL_ACTIVITY_STATUS: &str = "not-started";

/// Who and where an activity is planned for
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityBinding {
    /// Patient reference
    pub subject: Reference,
    /// Encounter reference
    pub encounter: Reference,
}

/// Instantiate `definition` for `action`, bound to the subject and encounter
pub fn instantiate(
    definition: &ActivityDefinition,
    action: &PlanAction,
    canonical: &str,
    binding: &ActivityBinding,
) -> CarePlanActivity {
    let description = definition
        .description
        .clone()
        .or_else(|| action.description.clone())
        .or_else(|| definition.title.clone());

    CarePlanActivity {
        detail: ActivityDetail {
            kind: definition.kind.clone(),
            instantiates_canonical: vec![canonical.to_string()],
            code: definition.code.clone(),
            status: INITIAL_ACTIVITY_STATUS.to_string(),
            description,
            subject: Some(binding.subject.clone()),
            encounter: Some(binding.encounter.clone()),
            extra: Map::new(),
        },
        action_id: action.id.clone(),
        action_title: action.title.clone(),
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CodeableConcept;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_instantiate() {
        let mut definition =
            ActivityDefinition::new("ADTest", "http://example.org/ActivityDefinition/ADTest");
        definition.kind = Some("ServiceRequest".to_string());
        definition.code = Some(CodeableConcept {
            text: Some("Blood pressure check".to_string()),
            ..Default::default()
        });

        let mut action = PlanAction::instantiating("http://example.org/ActivityDefinition/ADTest|1.0");
        action.id = Some("bp".to_string());
        action.description = Some("Check blood pressure".to_string());

        let binding = ActivityBinding {
            subject: Reference::to("Patient", "Test-Patient"),
            encounter: Reference::to("Encounter", "Test-Encounter"),
        };
        let activity = instantiate(
            &definition,
            &action,
            "http://example.org/ActivityDefinition/ADTest|1.0",
            &binding,
        );

        assert_eq!(
            serde_json::to_value(&activity).unwrap(),
            json!({
                "detail": {
                    "kind": "ServiceRequest",
                    "instantiatesCanonical": ["http://example.org/ActivityDefinition/ADTest|1.0"],
                    "code": {"text": "Blood pressure check"},
                    "status": "not-started",
                    "description": "Check blood pressure",
                    "subject": {"reference": "Patient/Test-Patient"},
                    "encounter": {"reference": "Encounter/Test-Encounter"}
                },
                "actionId": "bp"
            })
        );
    }
}
