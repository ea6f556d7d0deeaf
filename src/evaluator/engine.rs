use super::operators;
use crate::ast::{ValueExpr, Value};
use crate::data::VariableStore;
use crate::error::ExpressionError;
use crate::template;

/// The recursive engine for evaluating a [`ValueExpr`] against one scope.
///
/// Operation results feed their parents as strings, matching how the editor
/// chains operator blocks through their text outputs.
pub struct ExpressionEngine<'a> {
    current_data: &'a str,
    variables: &'a VariableStore,
    line: Option<&'a str>,
}

impl<'a> ExpressionEngine<'a> {
    pub fn new(current_data: &'a str, variables: &'a VariableStore, line: Option<&'a str>) -> Self {
        Self {
            current_data,
            variables,
            line,
        }
    }

    /// Evaluates `expr` to a typed value.
    pub fn evaluate(&self, expr: &ValueExpr) -> Result<Value, ExpressionError> {
        match expr {
            ValueExpr::Template(text) => Ok(Value::Text(template::substitute(
                text,
                self.current_data,
                self.variables,
                self.line,
            ))),
            ValueExpr::Variable(name) => self
                .variables
                .get(name)
                .map(|value| Value::Text(value.to_string()))
                .ok_or_else(|| ExpressionError::MissingVariable(name.clone())),
            ValueExpr::Operation { operator, operands } => {
                let inputs = operands
                    .iter()
                    .map(|operand| self.evaluate_to_string(operand))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(operators::evaluate(*operator, &inputs)?)
            }
        }
    }

    /// Evaluates `expr` and renders the result as text.
    pub fn evaluate_to_string(&self, expr: &ValueExpr) -> Result<String, ExpressionError> {
        self.evaluate(expr).map(|value| value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OperatorKind;

    #[test]
    fn nested_operations_are_evaluated_bottom_up() {
        let vars: VariableStore = [("count", "2")].into_iter().collect();
        let expr = ValueExpr::Operation {
            operator: OperatorKind::GreaterThan,
            operands: vec![
                ValueExpr::Operation {
                    operator: OperatorKind::Add,
                    operands: vec![ValueExpr::Variable("count".into()), ValueExpr::literal("1")],
                },
                ValueExpr::literal("{{input}}"),
            ],
        };
        let engine = ExpressionEngine::new("2", &vars, None);
        assert_eq!(engine.evaluate(&expr).unwrap(), Value::Bool(true));
    }

    #[test]
    fn missing_variable_is_an_error() {
        let vars = VariableStore::new();
        let engine = ExpressionEngine::new("", &vars, None);
        let err = engine
            .evaluate(&ValueExpr::Variable("ghost".into()))
            .unwrap_err();
        assert_eq!(err, ExpressionError::MissingVariable("ghost".into()));
    }
}
