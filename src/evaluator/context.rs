//! Evaluation context for FHIRPath expressions

use crate::model::FhirPathValue;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Context for evaluating FHIRPath expressions
///
/// Child contexts created while walking paths share the variable and resource
/// tables, so `with_input` is cheap.
#[derive(Clone, Debug)]
pub struct EvaluationContext {
    /// Current input value being evaluated
    pub input: FhirPathValue,

    /// Root input value (for %context and %resource)
    pub root: FhirPathValue,

    /// Value of `$this`; falls back to `input` when unset
    this: Option<FhirPathValue>,

    /// Environment variables, keyed without the leading `%`
    variables: Arc<FxHashMap<String, FhirPathValue>>,

    /// Context resources selectable by a leading type name, e.g. `Patient.gender`
    resources: Arc<FxHashMap<String, FhirPathValue>>,
}

impl EvaluationContext {
    /// Create a new evaluation context rooted at `input`
    pub fn new(input: FhirPathValue) -> Self {
        let mut variables = FxHashMap::default();
        variables.insert("context".to_string(), input.clone());
        variables.insert("resource".to_string(), input.clone());

        let mut resources = FxHashMap::default();
        if let FhirPathValue::Resource(resource) = &input {
            if let Some(resource_type) = resource.resource_type() {
                resources.insert(resource_type.to_string(), input.clone());
            }
        }

        Self {
            root: input.clone(),
            input,
            this: None,
            variables: Arc::new(variables),
            resources: Arc::new(resources),
        }
    }

    /// Create a child context with new input value
    pub fn with_input(&self, input: FhirPathValue) -> Self {
        Self {
            input,
            root: self.root.clone(),
            this: self.this.clone(),
            variables: Arc::clone(&self.variables),
            resources: Arc::clone(&self.resources),
        }
    }

    /// Create a child context iterating over `item`, which becomes both the
    /// input and `$this`
    pub fn with_this(&self, item: FhirPathValue) -> Self {
        let mut child = self.with_input(item.clone());
        child.this = Some(item);
        child
    }

    /// Bind an environment variable (name without `%`)
    pub fn set_variable(&mut self, name: impl Into<String>, value: FhirPathValue) {
        Arc::make_mut(&mut self.variables).insert(name.into(), value);
    }

    /// Register a resource so that a leading type name selects it
    pub fn add_resource(&mut self, resource_type: impl Into<String>, value: FhirPathValue) {
        Arc::make_mut(&mut self.resources).insert(resource_type.into(), value);
    }

    /// Get a variable from the context
    pub fn get_variable(&self, name: &str) -> Option<&FhirPathValue> {
        self.variables.get(name)
    }

    /// Context resource registered under a type name
    pub fn get_resource(&self, resource_type: &str) -> Option<&FhirPathValue> {
        self.resources.get(resource_type)
    }

    /// Current `$this`
    pub fn this(&self) -> &FhirPathValue {
        self.this.as_ref().unwrap_or(&self.input)
    }
}
