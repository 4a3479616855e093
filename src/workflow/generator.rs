//! Care-plan generation from a PlanDefinition

use super::interpreter::{ActionState, PlanContext, PlanInterpreter};
use crate::error::{CarePlanError, Result};
use crate::expression::ExpressionEvaluator;
use crate::model::{
    CarePlan, CarePlanActivity, ClinicalRecord, Encounter, GeneratedPlan, PlanDefinition,
    Reference, ResourceKind,
};
use crate::store::ResourceStore;
use chrono::Utc;
use serde_json::Map;
use std::sync::Arc;
use uuid::Uuid;

/// Status of every generated plan
pub const GENERATED_PLAN_STATUS: &str = "draft";
/// Intent of every generated plan
pub const GENERATED_PLAN_INTENT: &str = "plan";

/// Applies PlanDefinitions to a patient and encounter
pub struct CarePlanGenerator {
    store: Arc<dyn ResourceStore>,
    interpreter: PlanInterpreter,
}

impl CarePlanGenerator {
    /// Create a generator reading from `store`
    pub fn new(store: Arc<dyn ResourceStore>, evaluator: Arc<ExpressionEvaluator>) -> Self {
        let interpreter = PlanInterpreter::new(Arc::clone(&store), evaluator);
        Self { store, interpreter }
    }

    /// Generate a CarePlan with one activity per applicable action
    ///
    /// All three ids must resolve. The plan is returned, not stored; nothing
    /// partial is produced on failure.
    pub async fn generate_care_plan(
        &self,
        plan_definition_id: &str,
        patient_id: &str,
        encounter_id: &str,
    ) -> Result<GeneratedPlan> {
        let plan = match self.fetch(ResourceKind::PlanDefinition, plan_definition_id).await? {
            ClinicalRecord::PlanDefinition(plan) => plan,
            _ => return Err(not_found(ResourceKind::PlanDefinition, plan_definition_id)),
        };
        let patient = self.fetch(ResourceKind::Patient, patient_id).await?;
        let encounter = self.fetch(ResourceKind::Encounter, encounter_id).await?;

        if let ClinicalRecord::Encounter(details) = &encounter {
            warn_on_subject_mismatch(details, patient_id);
        }

        log::info!(
            "Applying PlanDefinition/{plan_definition_id} to Patient/{patient_id} \
             in Encounter/{encounter_id}"
        );

        let context = PlanContext {
            subject: &patient,
            encounter: &encounter,
        };
        let outcomes = self.interpreter.interpret(&plan, context).await?;

        let skipped = outcomes
            .iter()
            .filter(|outcome| outcome.state == ActionState::Skipped)
            .count();
        let activity: Vec<_> = outcomes
            .into_iter()
            .filter_map(|outcome| outcome.activity)
            .collect();
        log::info!(
            "PlanDefinition/{plan_definition_id}: {} activities, {skipped} actions skipped",
            activity.len()
        );

        Ok(assemble(&plan, patient_id, encounter_id, activity))
    }

    async fn fetch(&self, kind: ResourceKind, id: &str) -> Result<ClinicalRecord> {
        let record = self.store.get(&kind, id).await?;
        if record.kind() == kind {
            Ok(record)
        } else {
            Err(not_found(kind, id))
        }
    }
}

fn not_found(kind: ResourceKind, id: &str) -> CarePlanError {
    CarePlanError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn warn_on_subject_mismatch(encounter: &Encounter, patient_id: &str) {
    match encounter.subject_patient_id() {
        Some(subject) if subject != patient_id => log::warn!(
            "Encounter/{} belongs to Patient/{subject}, not Patient/{patient_id}",
            encounter.id
        ),
        _ => {}
    }
}

fn assemble(
    plan: &PlanDefinition,
    patient_id: &str,
    encounter_id: &str,
    activity: Vec<CarePlanActivity>,
) -> GeneratedPlan {
    CarePlan {
        id: Uuid::new_v4().to_string(),
        status: GENERATED_PLAN_STATUS.to_string(),
        intent: GENERATED_PLAN_INTENT.to_string(),
        instantiates_canonical: vec![plan.canonical()],
        subject: Reference::to("Patient", patient_id),
        encounter: Some(Reference::to("Encounter", encounter_id)),
        created: Some(Utc::now()),
        activity,
        extra: Map::new(),
    }
}
