use crate::ast::{Condition, LegacyCondition, Node, NodeKind, OperatorKind, ValueExpr};
use crate::error::StructuralError;
use crate::graph::BlockDefinition;
use ahash::AHashMap;

/// Children already extracted for a block's input slots, keyed by slot name.
#[derive(Debug, Default)]
pub struct BlockInputs {
    pub statements: AHashMap<String, Vec<Node>>,
    pub values: AHashMap<String, ValueExpr>,
}

impl BlockInputs {
    /// Removes and returns the statement chain connected to `name`, or an empty chain.
    pub fn take_statements(&mut self, name: &str) -> Vec<Node> {
        self.statements.remove(name).unwrap_or_default()
    }

    pub fn take_value(&mut self, name: &str) -> Option<ValueExpr> {
        self.values.remove(name)
    }
}

/// Defines the contract for turning one editor block type into a [`Node`] or a [`ValueExpr`].
pub trait BlockParser: Send + Sync {
    fn block_type(&self) -> &str;

    /// Whether blocks of this type mark the entry point of a flow.
    fn is_start(&self) -> bool {
        false
    }

    /// Parses the block as an entry in a statement sequence.
    fn parse(&self, block: &BlockDefinition, inputs: BlockInputs) -> Result<Node, StructuralError>;

    /// Parses the block as the value connected to another block's input.
    fn parse_value(
        &self,
        block: &BlockDefinition,
        _inputs: BlockInputs,
    ) -> Result<ValueExpr, StructuralError> {
        Err(StructuralError::MisplacedBlock {
            block_id: block.id.clone(),
            type_name: block.block_type.clone(),
            message: "this block runs as a step and cannot be plugged into a value input".into(),
        })
    }
}

fn value_only(block: &BlockDefinition) -> StructuralError {
    StructuralError::MisplacedBlock {
        block_id: block.id.clone(),
        type_name: block.block_type.clone(),
        message: "this block produces a value; plug it into another block's input".into(),
    }
}

/// The value connected to `name`, else the same-named field as a literal, else empty.
fn operand(block: &BlockDefinition, inputs: &mut BlockInputs, name: &str) -> ValueExpr {
    inputs
        .take_value(name)
        .or_else(|| block.field_str(name).map(ValueExpr::Template))
        .unwrap_or_else(|| ValueExpr::literal(""))
}

fn variable_name(block: &BlockDefinition) -> String {
    block
        .field_str("VAR_NAME")
        .map(|name| name.trim().to_string())
        .unwrap_or_default()
}

/// Reads a sampling parameter from its direct field, else from a preset dropdown
/// whose `custom` option defers to a separate number field.
fn preset_param(
    block: &BlockDefinition,
    direct: &str,
    preset: &str,
    custom: &str,
) -> Option<(String, Result<f64, String>)> {
    if let Some(value) = block.field_f64(direct) {
        return Some((direct.to_string(), value));
    }
    match block.field_str(preset) {
        Some(choice) if choice.trim() == "custom" => block
            .field_f64(custom)
            .map(|value| (custom.to_string(), value)),
        Some(choice) if !choice.trim().is_empty() => Some((
            preset.to_string(),
            choice.trim().parse::<f64>().map_err(|_| choice.clone()),
        )),
        _ => None,
    }
}

fn invalid(block: &BlockDefinition, field: &str, message: String) -> StructuralError {
    StructuralError::InvalidParameter {
        block_id: block.id.clone(),
        field: field.to_string(),
        message,
    }
}

struct StartParser;
impl BlockParser for StartParser {
    fn block_type(&self) -> &str {
        "start_block"
    }
    fn is_start(&self) -> bool {
        true
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        Ok(Node::Start {
            id: block.id.clone(),
        })
    }
}

struct TextInputParser;
impl BlockParser for TextInputParser {
    fn block_type(&self) -> &str {
        "text_input_block"
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        Ok(Node::TextInput {
            id: block.id.clone(),
            value: block.field_str("TEXT").unwrap_or_default(),
        })
    }
}

struct VariableInputParser;
impl BlockParser for VariableInputParser {
    fn block_type(&self) -> &str {
        "variable_input_block"
    }
    fn parse(&self, block: &BlockDefinition, mut inputs: BlockInputs) -> Result<Node, StructuralError> {
        let expression =
            inputs
                .take_value("VALUE")
                .ok_or_else(|| StructuralError::MissingValueInput {
                    block_id: block.id.clone(),
                    kind: NodeKind::VariableInput,
                    slot: "VALUE".into(),
                })?;
        Ok(Node::VariableInput {
            id: block.id.clone(),
            expression,
        })
    }
}

struct LlmParser;
impl LlmParser {
    const DEFAULT_PROVIDER: &'static str = "openai";
    const DEFAULT_TEMPERATURE: f64 = 0.7;
    const DEFAULT_MAX_TOKENS: u32 = 1024;
    const DEFAULT_TOP_P: f64 = 1.0;
}
impl BlockParser for LlmParser {
    fn block_type(&self) -> &str {
        "llm_block"
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        let temperature =
            match preset_param(block, "TEMPERATURE", "CREATIVITY_PRESET", "TEMPERATURE_CUSTOM") {
                None => Self::DEFAULT_TEMPERATURE,
                Some((field, Err(raw))) => {
                    return Err(invalid(block, &field, format!("'{}' is not a number", raw)));
                }
                Some((field, Ok(value))) => {
                    if !(0.0..=2.0).contains(&value) {
                        return Err(invalid(
                            block,
                            &field,
                            format!("temperature must be between 0 and 2, got {}", value),
                        ));
                    }
                    value
                }
            };

        let max_tokens =
            match preset_param(block, "MAX_TOKENS", "LENGTH_PRESET", "MAX_TOKENS_CUSTOM") {
                None => Self::DEFAULT_MAX_TOKENS,
                Some((field, Err(raw))) => {
                    return Err(invalid(block, &field, format!("'{}' is not a number", raw)));
                }
                Some((field, Ok(value))) => {
                    if value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
                        return Err(invalid(
                            block,
                            &field,
                            format!("max tokens must be a positive whole number, got {}", value),
                        ));
                    }
                    value as u32
                }
            };

        let top_p = match preset_param(block, "TOP_P", "FOCUS_PRESET", "TOP_P_CUSTOM") {
            None => Self::DEFAULT_TOP_P,
            Some((field, Err(raw))) => {
                return Err(invalid(block, &field, format!("'{}' is not a number", raw)));
            }
            Some((field, Ok(value))) => {
                if !(value > 0.0 && value <= 1.0) {
                    return Err(invalid(
                        block,
                        &field,
                        format!("top-p must be greater than 0 and at most 1, got {}", value),
                    ));
                }
                value
            }
        };

        Ok(Node::Model {
            id: block.id.clone(),
            provider: block
                .field_str("MODEL")
                .unwrap_or_else(|| Self::DEFAULT_PROVIDER.to_string()),
            prompt_template: block.field_str("PROMPT").unwrap_or_default(),
            temperature,
            max_tokens,
            top_p,
        })
    }
}

struct OutputParser;
impl BlockParser for OutputParser {
    fn block_type(&self) -> &str {
        "output_block"
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        Ok(Node::Output {
            id: block.id.clone(),
        })
    }
}

/// The classic If block with a discrete condition dropdown and both arms.
struct IfParser;
impl BlockParser for IfParser {
    fn block_type(&self) -> &str {
        "if_block"
    }
    fn parse(&self, block: &BlockDefinition, mut inputs: BlockInputs) -> Result<Node, StructuralError> {
        let kind = block
            .field_str("CONDITION_TYPE")
            .map(|name| LegacyCondition::from_name(&name))
            .unwrap_or(LegacyCondition::TextContains);
        Ok(Node::Branch {
            id: block.id.clone(),
            condition: Condition::Legacy {
                kind,
                value: block.field_str("VALUE").unwrap_or_default(),
            },
            then_branch: inputs.take_statements("THEN_BLOCKS"),
            else_branch: inputs.take_statements("ELSE_BLOCKS"),
        })
    }
}

/// If/Then with a boolean expression plugged into `CONDITION`.
struct IfThenParser;
impl BlockParser for IfThenParser {
    fn block_type(&self) -> &str {
        "if_then_block"
    }
    fn parse(&self, block: &BlockDefinition, mut inputs: BlockInputs) -> Result<Node, StructuralError> {
        let condition = inputs
            .take_value("CONDITION")
            .unwrap_or_else(|| ValueExpr::literal("false"));
        Ok(Node::Branch {
            id: block.id.clone(),
            condition: Condition::Expression(condition),
            then_branch: inputs.take_statements("THEN_BLOCKS"),
            else_branch: inputs.take_statements("ELSE_BLOCKS"),
        })
    }
}

struct ForEachLineParser;
impl BlockParser for ForEachLineParser {
    fn block_type(&self) -> &str {
        "for_each_line_block"
    }
    fn parse(&self, block: &BlockDefinition, mut inputs: BlockInputs) -> Result<Node, StructuralError> {
        Ok(Node::ForEachLine {
            id: block.id.clone(),
            body: inputs.take_statements("CHILD_BLOCKS"),
        })
    }
}

struct SetVariableParser;
impl BlockParser for SetVariableParser {
    fn block_type(&self) -> &str {
        "set_variable_block"
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        Ok(Node::SetVariable {
            id: block.id.clone(),
            name: variable_name(block),
            value: ValueExpr::Template(block.field_str("VAR_VALUE").unwrap_or_default()),
        })
    }
}

/// Set Variable whose value comes from a block plugged into `VALUE`.
struct SetValueParser;
impl BlockParser for SetValueParser {
    fn block_type(&self) -> &str {
        "set_value_block"
    }
    fn parse(&self, block: &BlockDefinition, mut inputs: BlockInputs) -> Result<Node, StructuralError> {
        Ok(Node::SetVariable {
            id: block.id.clone(),
            name: variable_name(block),
            value: inputs
                .take_value("VALUE")
                .unwrap_or_else(|| ValueExpr::literal("")),
        })
    }
}

struct GetVariableParser;
impl BlockParser for GetVariableParser {
    fn block_type(&self) -> &str {
        "get_variable_block"
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        Ok(Node::GetVariable {
            id: block.id.clone(),
            name: variable_name(block),
        })
    }
    fn parse_value(
        &self,
        block: &BlockDefinition,
        _inputs: BlockInputs,
    ) -> Result<ValueExpr, StructuralError> {
        Ok(ValueExpr::Variable(variable_name(block)))
    }
}

struct VariableReporterParser;
impl BlockParser for VariableReporterParser {
    fn block_type(&self) -> &str {
        "variable_reporter_block"
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        Ok(Node::VariableReporter {
            id: block.id.clone(),
            name: variable_name(block),
        })
    }
    fn parse_value(
        &self,
        block: &BlockDefinition,
        _inputs: BlockInputs,
    ) -> Result<ValueExpr, StructuralError> {
        Ok(ValueExpr::Variable(variable_name(block)))
    }
}

/// A literal value typed into the block.
struct ValueInputParser;
impl BlockParser for ValueInputParser {
    fn block_type(&self) -> &str {
        "value_input_block"
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        Err(value_only(block))
    }
    fn parse_value(
        &self,
        block: &BlockDefinition,
        _inputs: BlockInputs,
    ) -> Result<ValueExpr, StructuralError> {
        Ok(ValueExpr::Template(
            block.field_str("VALUE").unwrap_or_default(),
        ))
    }
}

/// The flow's current data as a value.
struct ValueOutputParser;
impl BlockParser for ValueOutputParser {
    fn block_type(&self) -> &str {
        "value_output_block"
    }
    fn parse(&self, block: &BlockDefinition, _inputs: BlockInputs) -> Result<Node, StructuralError> {
        Err(value_only(block))
    }
    fn parse_value(
        &self,
        _block: &BlockDefinition,
        _inputs: BlockInputs,
    ) -> Result<ValueExpr, StructuralError> {
        Ok(ValueExpr::literal("{{input}}"))
    }
}

/// Master macro to define the operator block parsers alongside the other built-ins,
/// their registration, and their creation by name.
macro_rules! define_block_parsers {
    (
        $( ($struct_name:ident, $block_type:expr) ),* $(,)? ;
        $( ($op_struct:ident, $op_type:expr, $kind:path, [$($slot:expr),+]) ),* $(,)?
    ) => {
        $(
            struct $op_struct;
            impl BlockParser for $op_struct {
                fn block_type(&self) -> &str { $op_type }
                fn parse(&self, block: &BlockDefinition, mut inputs: BlockInputs) -> Result<Node, StructuralError> {
                    Ok(Node::Operator {
                        id: block.id.clone(),
                        operator: $kind,
                        inputs: vec![$( operand(block, &mut inputs, $slot) ),+],
                    })
                }
                fn parse_value(&self, block: &BlockDefinition, mut inputs: BlockInputs) -> Result<ValueExpr, StructuralError> {
                    Ok(ValueExpr::Operation {
                        operator: $kind,
                        operands: vec![$( operand(block, &mut inputs, $slot) ),+],
                    })
                }
            }
        )*

        /// Registers every built-in parser under its block type.
        pub(super) fn register_default_parsers(registry: &mut AHashMap<String, Box<dyn BlockParser>>) {
            $( registry.insert($block_type.to_string(), Box::new($struct_name)); )*
            $( registry.insert($op_type.to_string(), Box::new($op_struct)); )*
        }

        /// Creates a built-in parser by its block type name.
        pub(super) fn create_parser_by_name(name: &str) -> Option<Box<dyn BlockParser>> {
            match name {
                $( $block_type => Some(Box::new($struct_name)), )*
                $( $op_type => Some(Box::new($op_struct)), )*
                _ => None,
            }
        }
    };
}

define_block_parsers! {
    (StartParser, "start_block"),
    (TextInputParser, "text_input_block"),
    (VariableInputParser, "variable_input_block"),
    (LlmParser, "llm_block"),
    (OutputParser, "output_block"),
    (IfParser, "if_block"),
    (IfThenParser, "if_then_block"),
    (ForEachLineParser, "for_each_line_block"),
    (SetVariableParser, "set_variable_block"),
    (SetValueParser, "set_value_block"),
    (GetVariableParser, "get_variable_block"),
    (VariableReporterParser, "variable_reporter_block"),
    (ValueInputParser, "value_input_block"),
    (ValueOutputParser, "value_output_block"),

    ; // Separator between structural blocks and operators

    (MathAddParser, "math_add_block", OperatorKind::Add, ["A", "B"]),
    (MathSubtractParser, "math_subtract_block", OperatorKind::Subtract, ["A", "B"]),
    (MathMultiplyParser, "math_multiply_block", OperatorKind::Multiply, ["A", "B"]),
    (MathDivideParser, "math_divide_block", OperatorKind::Divide, ["A", "B"]),
    (ComparisonEqualsParser, "comparison_equals_block", OperatorKind::Equals, ["A", "B"]),
    (ComparisonNotEqualsParser, "comparison_not_equals_block", OperatorKind::NotEquals, ["A", "B"]),
    (ComparisonGreaterThanParser, "comparison_greater_than_block", OperatorKind::GreaterThan, ["A", "B"]),
    (ComparisonLessThanParser, "comparison_less_than_block", OperatorKind::LessThan, ["A", "B"]),
    (BooleanEqualsParser, "boolean_equals_block", OperatorKind::Equals, ["A", "B"]),
    (BooleanNotEqualsParser, "boolean_not_equals_block", OperatorKind::NotEquals, ["A", "B"]),
    (BooleanGreaterThanParser, "boolean_greater_than_block", OperatorKind::GreaterThan, ["A", "B"]),
    (BooleanLessThanParser, "boolean_less_than_block", OperatorKind::LessThan, ["A", "B"]),
    (BooleanAndParser, "boolean_and_block", OperatorKind::And, ["A", "B"]),
    (BooleanOrParser, "boolean_or_block", OperatorKind::Or, ["A", "B"]),
    (BooleanNotParser, "boolean_not_block", OperatorKind::Not, ["A"]),
    (LogicalAndParser, "logical_and_block", OperatorKind::And, ["A", "B"]),
    (LogicalOrParser, "logical_or_block", OperatorKind::Or, ["A", "B"]),
    (LogicalNotParser, "logical_not_block", OperatorKind::Not, ["A"]),
    (StringConcatenateParser, "string_concatenate_block", OperatorKind::Concatenate, ["A", "B"]),
    (StringSubstringParser, "string_substring_block", OperatorKind::Substring, ["TEXT", "START", "END"]),
    (StringLengthParser, "string_length_block", OperatorKind::Length, ["TEXT"]),
}
