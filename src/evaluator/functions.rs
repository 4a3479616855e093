//! Built-in FHIRPath functions
//!
//! Only the existence, filtering and conditional functions plan conditions
//! rely on are provided; anything else is reported as an unknown function.

use super::engine::{singleton, to_logical};
use super::{EvaluationContext, EvaluationError, EvaluationResult, FhirPathEngine};
use crate::ast::ExpressionNode;
use crate::model::FhirPathValue;

/// Dispatch a function call on `focus`
pub(crate) fn call(
    engine: &FhirPathEngine,
    name: &str,
    args: &[ExpressionNode],
    focus: FhirPathValue,
    context: &EvaluationContext,
) -> EvaluationResult<FhirPathValue> {
    match name {
        "exists" => {
            check_arity(name, args, 0, 1)?;
            let matches = match args.first() {
                Some(criteria) => filter(engine, name, criteria, focus, context)?,
                None => focus,
            };
            Ok(FhirPathValue::Boolean(!matches.is_empty()))
        }
        "empty" => {
            check_arity(name, args, 0, 0)?;
            Ok(FhirPathValue::Boolean(focus.is_empty()))
        }
        "not" => {
            check_arity(name, args, 0, 0)?;
            Ok(match to_logical(&focus, "not()")? {
                Some(value) => FhirPathValue::Boolean(!value),
                None => FhirPathValue::Empty,
            })
        }
        "count" => {
            check_arity(name, args, 0, 0)?;
            let count = i64::try_from(focus.len()).unwrap_or(i64::MAX);
            Ok(FhirPathValue::Integer(count))
        }
        "first" => {
            check_arity(name, args, 0, 0)?;
            Ok(focus.first().cloned().unwrap_or(FhirPathValue::Empty))
        }
        "last" => {
            check_arity(name, args, 0, 0)?;
            Ok(focus.last().cloned().unwrap_or(FhirPathValue::Empty))
        }
        "hasValue" => {
            check_arity(name, args, 0, 0)?;
            let has_value = focus.len() == 1 && focus.first().is_some_and(FhirPathValue::is_primitive);
            Ok(FhirPathValue::Boolean(has_value))
        }
        "where" => {
            check_arity(name, args, 1, 1)?;
            filter(engine, name, &args[0], focus, context)
        }
        "iif" => {
            check_arity(name, args, 2, 3)?;
            iif(engine, args, focus, context)
        }
        _ => Err(EvaluationError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

fn check_arity(
    name: &str,
    args: &[ExpressionNode],
    min: usize,
    max: usize,
) -> EvaluationResult<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("expected {min} argument(s)")
    } else {
        format!("expected {min} to {max} arguments")
    };
    Err(EvaluationError::InvalidArguments {
        function: name.to_string(),
        message: format!("{expected}, got {}", args.len()),
    })
}

/// Items of `focus` for which `criteria` is true, with each item as `$this`
fn filter(
    engine: &FhirPathEngine,
    name: &str,
    criteria: &ExpressionNode,
    focus: FhirPathValue,
    context: &EvaluationContext,
) -> EvaluationResult<FhirPathValue> {
    let mut kept = Vec::new();
    for item in focus.to_collection() {
        let item_context = context.with_this(item.clone());
        let result = engine.evaluate_with_context(criteria, &item_context)?;
        match singleton(&result, name)? {
            None | Some(FhirPathValue::Boolean(false)) => {}
            Some(FhirPathValue::Boolean(true)) => kept.push(item),
            Some(other) => {
                return Err(EvaluationError::TypeError {
                    expected: "Boolean".to_string(),
                    actual: other.type_name().to_string(),
                });
            }
        }
    }
    Ok(FhirPathValue::collection(kept))
}

/// `iif(criterion, true-result [, otherwise-result])`; only the chosen branch
/// is evaluated
fn iif(
    engine: &FhirPathEngine,
    args: &[ExpressionNode],
    focus: FhirPathValue,
    context: &EvaluationContext,
) -> EvaluationResult<FhirPathValue> {
    if focus.len() > 1 {
        return Err(EvaluationError::NotSingleton {
            operation: "iif()".to_string(),
            count: focus.len(),
        });
    }

    let branch_context = context.with_this(focus);
    let criterion = engine.evaluate_with_context(&args[0], &branch_context)?;
    let chosen = match to_logical(&criterion, "iif()")? {
        Some(true) => args.get(1),
        _ => args.get(2),
    };

    match chosen {
        Some(branch) => engine.evaluate_with_context(branch, &branch_context),
        None => Ok(FhirPathValue::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FhirResource;
    use crate::parser::parse_expression;
    use serde_json::json;

    fn eval(text: &str) -> EvaluationResult<FhirPathValue> {
        let patient = FhirPathValue::Resource(FhirResource::from_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "gender": "female",
            "name": [
                {"use": "official", "family": "Doe"},
                {"use": "nickname", "given": ["Annie"]}
            ]
        })));
        let expression = parse_expression(text).unwrap();
        FhirPathEngine::new().evaluate(&expression, patient)
    }

    #[test]
    fn test_existence() {
        assert_eq!(eval("name.exists()").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("name.given.empty()").unwrap(), FhirPathValue::Boolean(false));
        assert_eq!(eval("exists()").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("{}.exists()").unwrap(), FhirPathValue::Boolean(false));
        assert_eq!(
            eval("name.exists(use = 'temp')").unwrap(),
            FhirPathValue::Boolean(false)
        );
    }

    #[test]
    fn test_where_and_this() {
        assert_eq!(
            eval("name.where(use = 'official').family").unwrap(),
            FhirPathValue::from("Doe")
        );
        assert_eq!(
            eval("name.given.where($this = 'Annie').count()").unwrap(),
            FhirPathValue::Integer(1)
        );
        assert!(matches!(
            eval("name.where(use)"),
            Err(EvaluationError::TypeError { .. })
        ));
    }

    #[test]
    fn test_subsetting() {
        assert_eq!(eval("name.count()").unwrap(), FhirPathValue::Integer(2));
        assert_eq!(eval("name.use.first()").unwrap(), FhirPathValue::from("official"));
        assert_eq!(eval("name.use.last()").unwrap(), FhirPathValue::from("nickname"));
        assert_eq!(eval("{}.first()").unwrap(), FhirPathValue::Empty);
    }

    #[test]
    fn test_not_and_has_value() {
        assert_eq!(eval("(gender = 'male').not()").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("{}.not()").unwrap(), FhirPathValue::Empty);
        assert_eq!(eval("gender.hasValue()").unwrap(), FhirPathValue::Boolean(true));
        assert_eq!(eval("name.hasValue()").unwrap(), FhirPathValue::Boolean(false));
    }

    #[test]
    fn test_iif() {
        assert_eq!(
            eval("iif(gender = 'female', 'F', 'M')").unwrap(),
            FhirPathValue::from("F")
        );
        assert_eq!(eval("iif(false, 1)").unwrap(), FhirPathValue::Empty);
        // the untaken branch is never evaluated
        assert_eq!(eval("iif(true, 1, deceased)").unwrap(), FhirPathValue::Integer(1));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert_eq!(
            eval("name.descendants()"),
            Err(EvaluationError::UnknownFunction {
                name: "descendants".to_string()
            })
        );
        assert!(matches!(
            eval("name.where()"),
            Err(EvaluationError::InvalidArguments { .. })
        ));
    }
}
