//! Main FHIRPath evaluation engine

use super::functions;
use super::{EvaluationContext, EvaluationError, EvaluationResult};
use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
use crate::model::{Collection, FhirPathValue};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

/// Tree-walking FHIRPath evaluator
///
/// Holds no per-evaluation state, so one engine can serve any number of
/// concurrent evaluations.
#[derive(Debug, Clone)]
pub struct FhirPathEngine {
    /// Fail on members missing from a resource instead of yielding empty
    strict_paths: bool,
}

impl FhirPathEngine {
    /// Create a new engine in strict path mode
    pub fn new() -> Self {
        Self { strict_paths: true }
    }

    /// Choose between strict and lenient member navigation
    pub fn with_strict_paths(mut self, strict: bool) -> Self {
        self.strict_paths = strict;
        self
    }

    /// Whether missing members on a resource raise an error
    pub fn strict_paths(&self) -> bool {
        self.strict_paths
    }

    /// Evaluate an FHIRPath expression against input data
    pub fn evaluate(
        &self,
        expression: &ExpressionNode,
        input: FhirPathValue,
    ) -> EvaluationResult<FhirPathValue> {
        let context = EvaluationContext::new(input);
        self.evaluate_with_context(expression, &context)
    }

    /// Evaluate with explicit context
    pub fn evaluate_with_context(
        &self,
        expression: &ExpressionNode,
        context: &EvaluationContext,
    ) -> EvaluationResult<FhirPathValue> {
        match expression {
            ExpressionNode::Literal(literal) => self.evaluate_literal(literal),
            ExpressionNode::Identifier(name) => self.evaluate_identifier(name, context),
            ExpressionNode::Variable(name) => self.evaluate_variable(name, context),
            ExpressionNode::FunctionCall { name, args } => {
                functions::call(self, name, args, context.input.clone(), context)
            }
            ExpressionNode::MethodCall { base, method, args } => {
                let focus = self.evaluate_with_context(base, context)?;
                functions::call(self, method, args, focus, context)
            }
            ExpressionNode::BinaryOp { op, left, right } => {
                self.evaluate_binary_op(*op, left, right, context)
            }
            ExpressionNode::UnaryOp { op, operand } => {
                self.evaluate_unary_op(*op, operand, context)
            }
            ExpressionNode::Path { base, path } => {
                let focus = self.evaluate_with_context(base, context)?;
                self.navigate(&focus, path)
            }
            ExpressionNode::Index { base, index } => self.evaluate_index(base, index, context),
        }
    }

    fn evaluate_literal(&self, literal: &LiteralValue) -> EvaluationResult<FhirPathValue> {
        match literal {
            LiteralValue::Boolean(b) => Ok(FhirPathValue::Boolean(*b)),
            LiteralValue::Integer(i) => Ok(FhirPathValue::Integer(*i)),
            LiteralValue::Decimal(text) => Decimal::from_str(text)
                .map(FhirPathValue::Decimal)
                .map_err(|_| EvaluationError::InvalidOperation {
                    message: format!("decimal literal {text} is out of range"),
                }),
            LiteralValue::String(s) => Ok(FhirPathValue::String(s.clone())),
            LiteralValue::Null => Ok(FhirPathValue::Empty),
        }
    }

    /// Evaluate an identifier at the start of an expression or argument
    fn evaluate_identifier(
        &self,
        name: &str,
        context: &EvaluationContext,
    ) -> EvaluationResult<FhirPathValue> {
        if let FhirPathValue::Resource(resource) = &context.input {
            if resource.resource_type() == Some(name) {
                return Ok(context.input.clone());
            }
        }

        let looks_like_type = name.chars().next().is_some_and(char::is_uppercase);
        if looks_like_type {
            if let Some(resource) = context.get_resource(name) {
                return Ok(resource.clone());
            }
        }

        self.navigate(&context.input, name)
    }

    /// Member navigation over every item of `focus`, flattening the results
    pub(crate) fn navigate(
        &self,
        focus: &FhirPathValue,
        name: &str,
    ) -> EvaluationResult<FhirPathValue> {
        match focus {
            FhirPathValue::Resource(resource) => match resource.get_property(name) {
                Some(value) => Ok(FhirPathValue::from(value)),
                None if self.strict_paths && resource.is_resource() => {
                    Err(EvaluationError::PropertyNotFound {
                        property: name.to_string(),
                        resource_type: resource.resource_type().unwrap_or("Element").to_string(),
                    })
                }
                None => Ok(FhirPathValue::Empty),
            },
            FhirPathValue::Collection(items) => {
                let mut results = Collection::new();
                for item in items.iter() {
                    if let FhirPathValue::Resource(resource) = item {
                        if let Some(value) = resource.get_property(name) {
                            results.push(FhirPathValue::from(value));
                        }
                    }
                }
                Ok(FhirPathValue::collection(results.into_vec()))
            }
            _ => Ok(FhirPathValue::Empty),
        }
    }

    fn evaluate_variable(
        &self,
        name: &str,
        context: &EvaluationContext,
    ) -> EvaluationResult<FhirPathValue> {
        match name {
            "this" => Ok(context.this().clone()),
            _ => context
                .get_variable(name)
                .cloned()
                .ok_or_else(|| EvaluationError::VariableNotFound {
                    name: name.to_string(),
                }),
        }
    }

    fn evaluate_index(
        &self,
        base: &ExpressionNode,
        index: &ExpressionNode,
        context: &EvaluationContext,
    ) -> EvaluationResult<FhirPathValue> {
        let base_val = self.evaluate_with_context(base, context)?;
        let index_val = self.evaluate_with_context(index, context)?;

        let index_num = match singleton(&index_val, "[]")? {
            Some(FhirPathValue::Integer(i)) => *i,
            Some(other) => {
                return Err(EvaluationError::TypeError {
                    expected: "Integer".to_string(),
                    actual: other.type_name().to_string(),
                });
            }
            None => return Ok(FhirPathValue::Empty),
        };

        let item = usize::try_from(index_num)
            .ok()
            .and_then(|i| base_val.iter().nth(i))
            .cloned();
        Ok(item.unwrap_or(FhirPathValue::Empty))
    }

    fn evaluate_binary_op(
        &self,
        op: BinaryOperator,
        left: &ExpressionNode,
        right: &ExpressionNode,
        context: &EvaluationContext,
    ) -> EvaluationResult<FhirPathValue> {
        if op.is_logical() {
            return self.evaluate_logical(op, left, right, context);
        }

        let left_val = self.evaluate_with_context(left, context)?;
        let right_val = self.evaluate_with_context(right, context)?;

        match op {
            BinaryOperator::Equal => Ok(equality(&left_val, &right_val)
                .map(FhirPathValue::Boolean)
                .unwrap_or(FhirPathValue::Empty)),
            BinaryOperator::NotEqual => Ok(equality(&left_val, &right_val)
                .map(|equal| FhirPathValue::Boolean(!equal))
                .unwrap_or(FhirPathValue::Empty)),
            BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => self.compare(op, &left_val, &right_val),
            BinaryOperator::Union => {
                let mut results: Vec<FhirPathValue> = Vec::new();
                for item in left_val.iter().chain(right_val.iter()) {
                    if !results.iter().any(|seen| values_equal(seen, item)) {
                        results.push(item.clone());
                    }
                }
                Ok(FhirPathValue::collection(results))
            }
            BinaryOperator::In => membership(&left_val, &right_val, op),
            BinaryOperator::Contains => membership(&right_val, &left_val, op),
            BinaryOperator::Add | BinaryOperator::Subtract => {
                arithmetic(op, &left_val, &right_val)
            }
            BinaryOperator::Concatenate => {
                let left_text = concat_operand(&left_val)?;
                let right_text = concat_operand(&right_val)?;
                Ok(FhirPathValue::String(format!("{left_text}{right_text}")))
            }
            BinaryOperator::And
            | BinaryOperator::Or
            | BinaryOperator::Xor
            | BinaryOperator::Implies => Err(EvaluationError::InvalidOperation {
                message: format!("'{}' has no value semantics", op.symbol()),
            }),
        }
    }

    /// Three-valued boolean logic; the right side is skipped once the left
    /// side decides the result
    fn evaluate_logical(
        &self,
        op: BinaryOperator,
        left: &ExpressionNode,
        right: &ExpressionNode,
        context: &EvaluationContext,
    ) -> EvaluationResult<FhirPathValue> {
        let left_val = to_logical(&self.evaluate_with_context(left, context)?, op.symbol())?;

        match (op, left_val) {
            (BinaryOperator::And, Some(false)) => return Ok(FhirPathValue::Boolean(false)),
            (BinaryOperator::Or, Some(true)) => return Ok(FhirPathValue::Boolean(true)),
            (BinaryOperator::Implies, Some(false)) => return Ok(FhirPathValue::Boolean(true)),
            _ => {}
        }

        let right_val = to_logical(&self.evaluate_with_context(right, context)?, op.symbol())?;

        let result = match op {
            BinaryOperator::And => match (left_val, right_val) {
                (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            BinaryOperator::Or => match (left_val, right_val) {
                (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            BinaryOperator::Xor => match (left_val, right_val) {
                (Some(l), Some(r)) => Some(l != r),
                _ => None,
            },
            BinaryOperator::Implies => match (left_val, right_val) {
                (_, Some(true)) => Some(true),
                (Some(true), Some(false)) => Some(false),
                _ => None,
            },
            _ => None,
        };

        Ok(result
            .map(FhirPathValue::Boolean)
            .unwrap_or(FhirPathValue::Empty))
    }

    fn compare(
        &self,
        op: BinaryOperator,
        left: &FhirPathValue,
        right: &FhirPathValue,
    ) -> EvaluationResult<FhirPathValue> {
        let (Some(l), Some(r)) = (singleton(left, op.symbol())?, singleton(right, op.symbol())?)
        else {
            return Ok(FhirPathValue::Empty);
        };

        let ordering = compare_values(l, r).ok_or_else(|| EvaluationError::TypeError {
            expected: format!("a value comparable to {}", l.type_name()),
            actual: r.type_name().to_string(),
        })?;

        let result = match op {
            BinaryOperator::LessThan => ordering == Ordering::Less,
            BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
            BinaryOperator::GreaterThan => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        Ok(FhirPathValue::Boolean(result))
    }

    fn evaluate_unary_op(
        &self,
        op: UnaryOperator,
        operand: &ExpressionNode,
        context: &EvaluationContext,
    ) -> EvaluationResult<FhirPathValue> {
        let value = self.evaluate_with_context(operand, context)?;
        let Some(item) = singleton(&value, op.symbol())? else {
            return Ok(FhirPathValue::Empty);
        };

        match (op, item) {
            (UnaryOperator::Positive, FhirPathValue::Integer(_) | FhirPathValue::Decimal(_)) => {
                Ok(item.clone())
            }
            (UnaryOperator::Negate, FhirPathValue::Integer(i)) => i
                .checked_neg()
                .map(FhirPathValue::Integer)
                .ok_or_else(overflow),
            (UnaryOperator::Negate, FhirPathValue::Decimal(d)) => Ok(FhirPathValue::Decimal(-*d)),
            (_, other) => Err(EvaluationError::TypeError {
                expected: "Integer or Decimal".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }
}

impl Default for FhirPathEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The single item of `value`, `None` when empty
pub(crate) fn singleton<'a>(
    value: &'a FhirPathValue,
    operation: &str,
) -> EvaluationResult<Option<&'a FhirPathValue>> {
    match value.len() {
        0 => Ok(None),
        1 => Ok(value.first()),
        count => Err(EvaluationError::NotSingleton {
            operation: operation.to_string(),
            count,
        }),
    }
}

/// Singleton evaluation of collections for boolean operands
///
/// Empty is unknown, a Boolean is itself, any other single item is `true`.
pub(crate) fn to_logical(value: &FhirPathValue, operation: &str) -> EvaluationResult<Option<bool>> {
    Ok(match singleton(value, operation)? {
        None => None,
        Some(FhirPathValue::Boolean(b)) => Some(*b),
        Some(_) => Some(true),
    })
}

/// Item equality; numbers compare across Integer and Decimal
pub(crate) fn values_equal(left: &FhirPathValue, right: &FhirPathValue) -> bool {
    match (left, right) {
        (FhirPathValue::Integer(l), FhirPathValue::Decimal(r)) => Decimal::from(*l) == *r,
        (FhirPathValue::Decimal(l), FhirPathValue::Integer(r)) => *l == Decimal::from(*r),
        (FhirPathValue::Resource(l), FhirPathValue::Resource(r)) => l.as_json() == r.as_json(),
        _ => left == right,
    }
}

/// Collection equality; `None` when either side is empty
fn equality(left: &FhirPathValue, right: &FhirPathValue) -> Option<bool> {
    if left.is_empty() || right.is_empty() {
        return None;
    }
    if left.len() != right.len() {
        return Some(false);
    }
    Some(
        left.iter()
            .zip(right.iter())
            .all(|(l, r)| values_equal(l, r)),
    )
}

fn compare_values(left: &FhirPathValue, right: &FhirPathValue) -> Option<Ordering> {
    match (left, right) {
        (FhirPathValue::Integer(l), FhirPathValue::Integer(r)) => Some(l.cmp(r)),
        (FhirPathValue::Integer(l), FhirPathValue::Decimal(r)) => Some(Decimal::from(*l).cmp(r)),
        (FhirPathValue::Decimal(l), FhirPathValue::Integer(r)) => Some(l.cmp(&Decimal::from(*r))),
        (FhirPathValue::Decimal(l), FhirPathValue::Decimal(r)) => Some(l.cmp(r)),
        // FHIR dates and instants are ISO strings, which order lexically
        (FhirPathValue::String(l), FhirPathValue::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// `item in collection`
fn membership(
    item: &FhirPathValue,
    collection: &FhirPathValue,
    op: BinaryOperator,
) -> EvaluationResult<FhirPathValue> {
    let Some(item) = singleton(item, op.symbol())? else {
        return Ok(FhirPathValue::Empty);
    };
    Ok(FhirPathValue::Boolean(
        collection.iter().any(|candidate| values_equal(candidate, item)),
    ))
}

fn arithmetic(
    op: BinaryOperator,
    left: &FhirPathValue,
    right: &FhirPathValue,
) -> EvaluationResult<FhirPathValue> {
    let (Some(l), Some(r)) = (singleton(left, op.symbol())?, singleton(right, op.symbol())?) else {
        return Ok(FhirPathValue::Empty);
    };

    let add = op == BinaryOperator::Add;
    match (l, r) {
        (FhirPathValue::Integer(a), FhirPathValue::Integer(b)) => {
            let result = if add { a.checked_add(*b) } else { a.checked_sub(*b) };
            result.map(FhirPathValue::Integer).ok_or_else(overflow)
        }
        (FhirPathValue::String(a), FhirPathValue::String(b)) if add => {
            Ok(FhirPathValue::String(format!("{a}{b}")))
        }
        _ => {
            let (Some(a), Some(b)) = (as_decimal(l), as_decimal(r)) else {
                return Err(EvaluationError::TypeError {
                    expected: format!("operands compatible with '{}'", op.symbol()),
                    actual: format!("{} and {}", l.type_name(), r.type_name()),
                });
            };
            let result = if add { a.checked_add(b) } else { a.checked_sub(b) };
            result.map(FhirPathValue::Decimal).ok_or_else(overflow)
        }
    }
}

fn as_decimal(value: &FhirPathValue) -> Option<Decimal> {
    match value {
        FhirPathValue::Integer(i) => Some(Decimal::from(*i)),
        FhirPathValue::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// `&` treats empty as the empty string
fn concat_operand(value: &FhirPathValue) -> EvaluationResult<String> {
    match singleton(value, "&")? {
        None => Ok(String::new()),
        Some(FhirPathValue::String(s)) => Ok(s.clone()),
        Some(other) => Err(EvaluationError::TypeError {
            expected: "String".to_string(),
            actual: other.type_name().to_string(),
        }),
    }
}

fn overflow() -> EvaluationError {
    EvaluationError::InvalidOperation {
        message: "arithmetic overflow".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FhirResource;
    use crate::parser::parse_expression;
    use serde_json::json;

    fn patient() -> FhirPathValue {
        FhirPathValue::Resource(FhirResource::from_json(json!({
            "resourceType": "Patient",
            "id": "Test-Patient",
            "gender": "female",
            "active": true,
            "name": [
                {"use": "official", "given": ["Ann", "Marie"], "family": "Doe"},
                {"use": "nickname", "given": ["Annie"]}
            ]
        })))
    }

    fn eval(text: &str) -> EvaluationResult<FhirPathValue> {
        let expression = parse_expression(text).unwrap();
        FhirPathEngine::new().evaluate(&expression, patient())
    }

    #[test]
    fn test_literals_and_arithmetic() {
        assert_eq!(eval("true").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("1 + 2").unwrap(), FhirPathValue::Integer(3));
        assert_eq!(
            eval("1 + 0.5").unwrap(),
            FhirPathValue::Decimal(Decimal::new(15, 1))
        );
        assert_eq!(eval("'a' & {} & 'b'").unwrap(), FhirPathValue::from("ab"));
        assert_eq!(eval("-(2 - 5)").unwrap(), FhirPathValue::Integer(3));
        assert_eq!(eval("{}").unwrap(), FhirPathValue::Empty);
    }

    #[test]
    fn test_navigation() {
        assert_eq!(eval("gender").unwrap(), FhirPathValue::from("female"));
        assert_eq!(eval("Patient.gender").unwrap(), FhirPathValue::from("female"));
        assert_eq!(eval("name.given").unwrap().len(), 3);
        assert_eq!(eval("name.given[1]").unwrap(), FhirPathValue::from("Marie"));
        assert_eq!(eval("name.given[7]").unwrap(), FhirPathValue::Empty);
        assert_eq!(eval("name.suffix").unwrap(), FhirPathValue::Empty);
    }

    #[test]
    fn test_strict_missing_member() {
        assert!(matches!(
            eval("deceased"),
            Err(EvaluationError::PropertyNotFound { .. })
        ));

        let expression = parse_expression("deceased.exists()").unwrap();
        let lenient = FhirPathEngine::new().with_strict_paths(false);
        assert_eq!(
            lenient.evaluate(&expression, patient()).unwrap(),
            FhirPathValue::Boolean(false)
        );
    }

    #[test]
    fn test_three_valued_logic() {
        assert_eq!(eval("true and {}").unwrap(), FhirPathValue::Empty);
        assert_eq!(eval("false and {}").unwrap(), FhirPathValue::Boolean(false));
        assert_eq!(eval("{} or true").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("true xor true").unwrap(), FhirPathValue::Boolean(false));
        assert_eq!(eval("false implies {}").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("{} implies false").unwrap(), FhirPathValue::Empty);
        // the right side is never reached
        assert_eq!(eval("false and deceased").unwrap(), FhirPathValue::Boolean(false));
    }

    #[test]
    fn test_equality_and_comparison() {
        assert_eq!(eval("gender = 'female'").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("gender != 'male'").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("name.suffix = 'x'").unwrap(), FhirPathValue::Empty);
        assert_eq!(eval("1 = 1.0").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("2 > 1.5").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("'2020-01-01' < '2021-06-30'").unwrap(), FhirPathValue::Boolean(true));
        assert!(matches!(eval("1 < 'a'"), Err(EvaluationError::TypeError { .. })));
        assert!(matches!(
            eval("name.given < 'z'"),
            Err(EvaluationError::NotSingleton { .. })
        ));
    }

    #[test]
    fn test_membership_and_union() {
        assert_eq!(eval("'Ann' in name.given").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("name.given contains 'Bob'").unwrap(), FhirPathValue::Boolean(false));
        assert_eq!(eval("(1 | 2 | 1).count()").unwrap(), FhirPathValue::Integer(2));
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(matches!(
            eval("9223372036854775807 + 1"),
            Err(EvaluationError::InvalidOperation { .. })
        ));
    }
}
