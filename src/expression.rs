//! Expression evaluation over clinical records
//!
//! Dispatches on the expression language, memoises parsed FHIRPath ASTs and
//! maps parser and evaluator errors onto [`CarePlanError`].

use crate::ast::ExpressionNode;
use crate::error::{CarePlanError, Result};
use crate::evaluator::{EvaluationContext, FhirPathEngine};
use crate::model::{ClinicalRecord, Expression, FHIRPATH_LANGUAGE, FhirPathValue, ResourceKind};
use crate::parser::parse_expression;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Evaluates condition expressions against a set of context records
pub struct ExpressionEvaluator {
    engine: FhirPathEngine,
    /// Parsed ASTs keyed by expression text; `None` when caching is disabled
    cache: Option<Mutex<LruCache<String, Arc<ExpressionNode>>>>,
}

impl ExpressionEvaluator {
    /// Create an evaluator caching up to `cache_size` parsed expressions
    pub fn new(cache_size: usize, strict_paths: bool) -> Self {
        Self {
            engine: FhirPathEngine::new().with_strict_paths(strict_paths),
            cache: NonZeroUsize::new(cache_size).map(|size| Mutex::new(LruCache::new(size))),
        }
    }

    /// Whether `language` names FHIRPath; MIME types compare case-insensitively
    pub fn supports(language: &str) -> bool {
        language.trim().eq_ignore_ascii_case(FHIRPATH_LANGUAGE)
    }

    /// Evaluate `text` in `language` against `records`
    ///
    /// The first record is the root focus and `%context`/`%resource`. Patients
    /// are bound to `%patient` and `%subject`, encounters to `%encounter`, and
    /// every record can be selected by its type name (`Encounter.status`).
    pub fn evaluate(
        &self,
        language: &str,
        text: &str,
        records: &[&ClinicalRecord],
    ) -> Result<FhirPathValue> {
        if !Self::supports(language) {
            return Err(CarePlanError::UnsupportedLanguage {
                language: language.to_string(),
            });
        }

        let ast = self.parse(text)?;
        let context = build_context(records);
        self.engine
            .evaluate_with_context(&ast, &context)
            .map_err(|error| CarePlanError::evaluation(text, error.to_string()))
    }

    /// Evaluate a condition: empty is false, a single Boolean is itself and
    /// anything else is an error
    pub fn evaluate_condition(
        &self,
        expression: &Expression,
        records: &[&ClinicalRecord],
    ) -> Result<bool> {
        let text = expression.expression.as_str();
        let value = self.evaluate(&expression.language, text, records)?;
        match value {
            FhirPathValue::Empty => Ok(false),
            FhirPathValue::Boolean(result) => Ok(result),
            other => Err(CarePlanError::evaluation(
                text,
                format!("condition must yield a single Boolean, got {other:?}"),
            )),
        }
    }

    /// Parse `text`, going through the cache when enabled
    pub fn parse(&self, text: &str) -> Result<Arc<ExpressionNode>> {
        let Some(cache) = &self.cache else {
            return self.parse_uncached(text);
        };

        if let Some(ast) = cache.lock().get(text) {
            return Ok(Arc::clone(ast));
        }

        let ast = self.parse_uncached(text)?;
        cache.lock().put(text.to_string(), Arc::clone(&ast));
        Ok(ast)
    }

    fn parse_uncached(&self, text: &str) -> Result<Arc<ExpressionNode>> {
        log::debug!("Parsing expression '{text}'");
        parse_expression(text)
            .map(Arc::new)
            .map_err(|error| CarePlanError::evaluation(text, error.to_string()))
    }

    /// Number of parsed expressions currently cached
    pub fn cached_expressions(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.lock().len())
    }
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EXPRESSION_CACHE_SIZE, true)
    }
}

fn build_context(records: &[&ClinicalRecord]) -> EvaluationContext {
    let values: Vec<(&ClinicalRecord, FhirPathValue)> = records
        .iter()
        .map(|record| (*record, FhirPathValue::Resource(record.to_resource())))
        .collect();

    let root = values
        .first()
        .map(|(_, value)| value.clone())
        .unwrap_or(FhirPathValue::Empty);
    let mut context = EvaluationContext::new(root);

    for (record, value) in values {
        match record.kind() {
            ResourceKind::Patient => {
                context.set_variable("patient", value.clone());
                context.set_variable("subject", value.clone());
            }
            ResourceKind::Encounter => context.set_variable("encounter", value.clone()),
            _ => {}
        }
        context.add_resource(record.resource_type(), value);
    }
    context
}
