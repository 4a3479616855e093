//! PlanDefinition and ActivityDefinition records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::datatypes::CodeableConcept;

/// MIME type tag of the FHIRPath expression language
pub const FHIRPATH_LANGUAGE: &str = "text/fhirpath";

/// An expression in a named language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Expression language, e.g. `text/fhirpath` or `text/cql`
    pub language: String,

    /// Expression text
    #[serde(default)]
    pub expression: String,

    /// Natural language description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Expression {
    /// A FHIRPath expression
    pub fn fhirpath(expression: impl Into<String>) -> Self {
        Self {
            language: FHIRPATH_LANGUAGE.to_string(),
            expression: expression.into(),
            description: None,
            extra: Map::new(),
        }
    }
}

/// When a condition applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    /// Decides whether the action is included
    Applicability,
    /// Start trigger, not evaluated during plan generation
    Start,
    /// Stop trigger, not evaluated during plan generation
    Stop,
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConditionKind::Applicability => "applicability",
            ConditionKind::Start => "start",
            ConditionKind::Stop => "stop",
        };
        f.write_str(text)
    }
}

/// A precondition on an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCondition {
    /// applicability | start | stop
    pub kind: ConditionKind,

    /// Boolean-valued expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionCondition {
    /// An applicability condition with a FHIRPath expression
    pub fn applicability(expression: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Applicability,
            expression: Some(Expression::fhirpath(expression)),
            extra: Map::new(),
        }
    }
}

/// One step of a PlanDefinition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAction {
    /// Unique id within the plan, when given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// User-visible title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Brief description of the action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether or not the action is applicable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condition: Vec<ActionCondition>,

    /// Canonical of the ActivityDefinition this action instantiates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_canonical: Option<String>,

    /// Sub-actions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action: Vec<PlanAction>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlanAction {
    /// An unconditional action pointing at an ActivityDefinition
    pub fn instantiating(canonical: impl Into<String>) -> Self {
        Self {
            definition_canonical: Some(canonical.into()),
            ..Default::default()
        }
    }

    /// Add a condition
    pub fn with_condition(mut self, condition: ActionCondition) -> Self {
        self.condition.push(condition);
        self
    }

    /// Conditions that decide applicability, in declaration order
    pub fn applicability_conditions(&self) -> impl Iterator<Item = &ActionCondition> {
        self.condition
            .iter()
            .filter(|condition| condition.kind == ConditionKind::Applicability)
    }
}

/// A pre-defined group of actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDefinition {
    /// Logical id
    pub id: String,

    /// Canonical identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Business version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Computer-friendly name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human-friendly name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// draft | active | retired | unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Ordered actions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action: Vec<PlanAction>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlanDefinition {
    /// An active plan definition with the given actions
    pub fn new(id: impl Into<String>, action: Vec<PlanAction>) -> Self {
        Self {
            id: id.into(),
            url: None,
            version: None,
            name: None,
            title: None,
            status: Some("active".to_string()),
            action,
            extra: Map::new(),
        }
    }

    /// Canonical a generated plan points back to: the url when present,
    /// otherwise the relative reference
    pub fn canonical(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("PlanDefinition/{}", self.id))
    }
}

/// The definition of a single activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDefinition {
    /// Logical id
    pub id: String,

    /// Canonical identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Business version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Computer-friendly name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human-friendly name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// draft | active | retired | unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Kind of resource the activity produces, e.g. `ServiceRequest`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Natural language description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Detail type of activity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    /// Members not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActivityDefinition {
    /// An active activity definition published under `url`
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: Some(url.into()),
            version: None,
            name: None,
            title: None,
            status: Some("active".to_string()),
            kind: None,
            description: None,
            code: None,
            extra: Map::new(),
        }
    }

    /// Canonical a generated activity points back to
    pub fn canonical(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("ActivityDefinition/{}", self.id))
    }
}
