//! PlanDefinition action interpreter
//!
//! Each action starts pending and moves to `Applicable` or `Skipped`; an applicable
//! action that names an ActivityDefinition moves on to `Instantiated`.
//! Any failure aborts the whole plan and is reported against the action's
//! index path.

use super::activity::{ActivityBinding, instantiate};
use crate::error::{CarePlanError, Result};
use crate::expression::ExpressionEvaluator;
use crate::model::{
    ActionCondition, ActivityDefinition, CarePlanActivity, ClinicalRecord, PlanAction,
    PlanDefinition, Reference, ResourceKind, validate_id,
};
use crate::store::ResourceStore;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Where an action ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// All applicability conditions held; nothing to instantiate
    Applicable,
    /// An applicability condition was false
    Skipped,
    /// An activity was produced
    Instantiated,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ActionState::Applicable => "applicable",
            ActionState::Skipped => "skipped",
            ActionState::Instantiated => "instantiated",
        };
        f.write_str(text)
    }
}

/// Result of interpreting one action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// Index path, e.g. `0` or `1.2`
    pub path: String,
    /// Final state
    pub state: ActionState,
    /// Activity produced, when instantiated
    pub activity: Option<CarePlanActivity>,
}

/// Records a plan is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    /// The patient the plan is for
    pub subject: &'a ClinicalRecord,
    /// The encounter the plan is made in
    pub encounter: &'a ClinicalRecord,
}

/// Walks PlanDefinition actions in order
pub struct PlanInterpreter {
    store: Arc<dyn ResourceStore>,
    evaluator: Arc<ExpressionEvaluator>,
}

impl PlanInterpreter {
    /// Create an interpreter resolving definitions from `store`
    pub fn new(store: Arc<dyn ResourceStore>, evaluator: Arc<ExpressionEvaluator>) -> Self {
        Self { store, evaluator }
    }

    /// Interpret every action of `plan`, depth first
    ///
    /// Sub-actions follow their parent and are only visited when the parent is
    /// applicable.
    pub async fn interpret(
        &self,
        plan: &PlanDefinition,
        context: PlanContext<'_>,
    ) -> Result<Vec<ActionOutcome>> {
        let binding = ActivityBinding {
            subject: Reference::to(context.subject.resource_type(), context.subject.id()),
            encounter: Reference::to(context.encounter.resource_type(), context.encounter.id()),
        };

        let mut pending: Vec<(String, &PlanAction)> = plan
            .action
            .iter()
            .enumerate()
            .rev()
            .map(|(index, action)| (index.to_string(), action))
            .collect();
        let mut outcomes = Vec::new();

        while let Some((path, action)) = pending.pop() {
            let outcome = self
                .interpret_action(action, &path, context, &binding)
                .await
                .map_err(|source| CarePlanError::ActionFailed {
                    plan_definition_id: plan.id.clone(),
                    action_path: path.clone(),
                    source: Box::new(source),
                })?;

            log::debug!(
                "PlanDefinition/{} action {path}: {}",
                plan.id,
                outcome.state
            );

            if outcome.state != ActionState::Skipped {
                for (index, child) in action.action.iter().enumerate().rev() {
                    pending.push((format!("{path}.{index}"), child));
                }
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn interpret_action(
        &self,
        action: &PlanAction,
        path: &str,
        context: PlanContext<'_>,
        binding: &ActivityBinding,
    ) -> Result<ActionOutcome> {
        if !self.is_applicable(action, context)? {
            return Ok(ActionOutcome {
                path: path.to_string(),
                state: ActionState::Skipped,
                activity: None,
            });
        }

        let Some(canonical) = action.definition_canonical.as_deref() else {
            log::debug!("Action {path} has no definitionCanonical");
            return Ok(ActionOutcome {
                path: path.to_string(),
                state: ActionState::Applicable,
                activity: None,
            });
        };

        let definition = self.resolve_activity_definition(canonical).await?;
        let activity = instantiate(&definition, action, canonical, binding);
        Ok(ActionOutcome {
            path: path.to_string(),
            state: ActionState::Instantiated,
            activity: Some(activity),
        })
    }

    /// True when every applicability condition holds, checked in order and
    /// stopping at the first false one
    fn is_applicable(&self, action: &PlanAction, context: PlanContext<'_>) -> Result<bool> {
        let records = [context.subject, context.encounter];
        for condition in action.applicability_conditions() {
            if !self.evaluate_condition(condition, &records)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn evaluate_condition(
        &self,
        condition: &ActionCondition,
        records: &[&ClinicalRecord],
    ) -> Result<bool> {
        let Some(expression) = &condition.expression else {
            return Err(CarePlanError::evaluation(
                "",
                format!("{} condition has no expression", condition.kind),
            ));
        };
        let result = self.evaluator.evaluate_condition(expression, records)?;
        log::debug!("Condition '{}' = {result}", expression.expression);
        Ok(result)
    }

    /// Resolve a canonical by url, then by its `ActivityDefinition/<id>` tail,
    /// then as a bare id
    ///
    /// A `|version` suffix pins the business version: only a definition with
    /// that version resolves. Without one, the lowest id among same-url
    /// definitions wins.
    pub async fn resolve_activity_definition(&self, canonical: &str) -> Result<ActivityDefinition> {
        let kind = ResourceKind::ActivityDefinition;
        let (url, version) = match canonical.split_once('|') {
            Some((url, version)) => (url, Some(version).filter(|v| !v.is_empty())),
            None => (canonical, None),
        };

        if let Some(record) = self.store.find_by_url(&kind, url, version).await? {
            return as_activity_definition(record, canonical);
        }

        let candidates = [canonical_tail_id(url), Some(url.to_string())];
        for id in candidates.into_iter().flatten() {
            if validate_id(&id).is_err() {
                continue;
            }
            match self.store.get(&kind, &id).await {
                Ok(record) if version.is_none() || record.version() == version => {
                    return as_activity_definition(record, canonical);
                }
                Ok(record) => {
                    log::debug!(
                        "ActivityDefinition/{id} has version {:?}, wanted {version:?}",
                        record.version()
                    );
                }
                Err(CarePlanError::NotFound { .. }) => {}
                Err(other) => return Err(other),
            }
        }

        Err(CarePlanError::UnresolvedReference {
            kind,
            reference: canonical.to_string(),
        })
    }
}

fn as_activity_definition(record: ClinicalRecord, canonical: &str) -> Result<ActivityDefinition> {
    match record {
        ClinicalRecord::ActivityDefinition(definition) => Ok(definition),
        _ => Err(CarePlanError::UnresolvedReference {
            kind: ResourceKind::ActivityDefinition,
            reference: canonical.to_string(),
        }),
    }
}

/// The id following an `ActivityDefinition` path segment, for absolute urls
/// and relative references alike
fn canonical_tail_id(canonical: &str) -> Option<String> {
    let segments: Vec<String> = match Url::parse(canonical) {
        Ok(url) => url.path_segments()?.map(str::to_string).collect(),
        Err(_) => canonical.split('/').map(str::to_string).collect(),
    };

    segments
        .windows(2)
        .rev()
        .find(|pair| pair[0] == "ActivityDefinition")
        .map(|pair| pair[1].clone())
        .filter(|id| !id.is_empty())
}
