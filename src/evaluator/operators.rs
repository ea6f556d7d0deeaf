use super::coercion::{to_bool, to_number};
use crate::ast::{OperatorKind, Value};
use crate::data::VariableStore;
use crate::error::OperatorError;
use crate::template;

// Generates the body of a binary numeric operator.
macro_rules! numeric_op {
    ($kind:expr, $inputs:expr, |$a:ident, $b:ident| $body:expr) => {{
        let $a = number($kind, &$inputs[0])?;
        let $b = number($kind, &$inputs[1])?;
        $body
    }};
}

/// Evaluates `kind` over already-substituted string operands.
pub fn evaluate<S: AsRef<str>>(kind: OperatorKind, inputs: &[S]) -> Result<Value, OperatorError> {
    if inputs.len() != kind.arity() {
        return Err(OperatorError::Arity {
            operator: kind.as_str().to_string(),
            expected: kind.arity(),
            found: inputs.len(),
        });
    }
    let inputs: Vec<&str> = inputs.iter().map(AsRef::as_ref).collect();

    let value = match kind {
        OperatorKind::Add => numeric_op!(kind, inputs, |a, b| Value::Number(a + b)),
        OperatorKind::Subtract => numeric_op!(kind, inputs, |a, b| Value::Number(a - b)),
        OperatorKind::Multiply => numeric_op!(kind, inputs, |a, b| Value::Number(a * b)),
        OperatorKind::Divide => numeric_op!(kind, inputs, |a, b| {
            if b == 0.0 {
                return Err(OperatorError::DivisionByZero);
            }
            Value::Number(a / b)
        }),
        OperatorKind::GreaterThan => numeric_op!(kind, inputs, |a, b| Value::Bool(a > b)),
        OperatorKind::LessThan => numeric_op!(kind, inputs, |a, b| Value::Bool(a < b)),
        OperatorKind::Equals => Value::Bool(loosely_equal(inputs[0], inputs[1])),
        OperatorKind::NotEquals => Value::Bool(!loosely_equal(inputs[0], inputs[1])),
        OperatorKind::And => Value::Bool(to_bool(inputs[0]) && to_bool(inputs[1])),
        OperatorKind::Or => Value::Bool(to_bool(inputs[0]) || to_bool(inputs[1])),
        OperatorKind::Not => Value::Bool(!to_bool(inputs[0])),
        OperatorKind::Concatenate => Value::Text(format!("{}{}", inputs[0], inputs[1])),
        OperatorKind::Substring => substring(inputs[0], inputs[1], inputs[2])?,
        OperatorKind::Length => Value::Number(inputs[0].chars().count() as f64),
    };
    Ok(value)
}

/// Substitutes variable placeholders in each operand, then evaluates.
pub fn evaluate_with_variables<S: AsRef<str>>(
    kind: OperatorKind,
    inputs: &[S],
    variables: &VariableStore,
) -> Result<Value, OperatorError> {
    let processed: Vec<String> = inputs
        .iter()
        .map(|input| template::substitute(input.as_ref(), "", variables, None))
        .collect();
    evaluate(kind, &processed)
}

fn number(kind: OperatorKind, input: &str) -> Result<f64, OperatorError> {
    to_number(input).ok_or_else(|| OperatorError::NotANumber {
        operator: kind.as_str().to_string(),
        found: input.trim().to_string(),
    })
}

/// Numeric comparison when both sides coerce, exact string comparison otherwise.
fn loosely_equal(a: &str, b: &str) -> bool {
    match (to_number(a), to_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Character-based substring with both bounds clamped to `[0, len]`.
fn substring(text: &str, start: &str, end: &str) -> Result<Value, OperatorError> {
    let len = text.chars().count();
    let clamp = |n: f64| n.trunc().clamp(0.0, len as f64) as usize;
    let start = clamp(number(OperatorKind::Substring, start)?);
    let end = clamp(number(OperatorKind::Substring, end)?);
    if start > end {
        return Err(OperatorError::InvalidRange { start, end });
    }
    Ok(Value::Text(
        text.chars().skip(start).take(end - start).collect(),
    ))
}
