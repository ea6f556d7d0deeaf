use crate::ast::{Condition, LegacyCondition, Node, NodeKind, ValueExpr};
use crate::data::VariableStore;
use crate::error::StructuralError;
use std::collections::HashSet;
use tracing::warn;

const TARGET: &str = "blockflow::extractor";

/// Checks the structural and content rules of an extracted flow.
///
/// A flow must start with a start node and end with an output node, either directly
/// or through a final branch whose arms both end in output.
pub fn validate(nodes: &[Node]) -> Result<(), StructuralError> {
    let first = nodes.first().ok_or(StructuralError::EmptyFlow)?;
    if nodes.len() < 2 {
        return Err(StructuralError::IncompleteFlow);
    }
    if first.kind() != NodeKind::Start {
        return Err(StructuralError::MustStartWithStart { found: first.kind() });
    }
    if let Some(last) = nodes.last() {
        check_ending(last)?;
    }
    if !has_content(nodes) {
        return Err(StructuralError::NoContentBlocks);
    }

    check_sequence(nodes, true)?;
    warn_unset_variables(nodes);
    Ok(())
}

fn check_ending(last: &Node) -> Result<(), StructuralError> {
    match last {
        Node::Output { .. } => Ok(()),
        Node::Branch {
            id,
            then_branch,
            else_branch,
            ..
        } => {
            if !ends_with_output(then_branch) {
                return Err(StructuralError::BranchMissingOutput {
                    block_id: id.clone(),
                    arm: "THEN".into(),
                });
            }
            if !ends_with_output(else_branch) {
                return Err(StructuralError::BranchMissingOutput {
                    block_id: id.clone(),
                    arm: "ELSE".into(),
                });
            }
            Ok(())
        }
        other => Err(StructuralError::MustEndWithOutput {
            found: other.kind(),
        }),
    }
}

/// Whether the flow holds any node besides its start and output nodes.
fn has_content(nodes: &[Node]) -> bool {
    nodes
        .iter()
        .any(|node| !matches!(node, Node::Start { .. } | Node::Output { .. }))
}

fn ends_with_output(nodes: &[Node]) -> bool {
    match nodes.last() {
        Some(Node::Output { .. }) => true,
        Some(Node::Branch {
            then_branch,
            else_branch,
            ..
        }) => ends_with_output(then_branch) && ends_with_output(else_branch),
        _ => false,
    }
}

fn check_sequence(nodes: &[Node], top_level: bool) -> Result<(), StructuralError> {
    for (position, node) in nodes.iter().enumerate() {
        match node {
            Node::Start { id } if !(top_level && position == 0) => {
                return Err(StructuralError::MisplacedBlock {
                    block_id: id.clone(),
                    type_name: NodeKind::Start.display_name().to_string(),
                    message: "a flow has exactly one start and it must come first".into(),
                });
            }
            Node::Output { id } if position + 1 != nodes.len() => {
                return Err(StructuralError::MisplacedOutput(id.clone()));
            }
            Node::TextInput { id, value } if value.trim().is_empty() => {
                return Err(StructuralError::EmptyTextInput(id.clone()));
            }
            Node::Model {
                id,
                provider,
                prompt_template,
                ..
            } => {
                if prompt_template.trim().is_empty() {
                    return Err(StructuralError::MissingPrompt(id.clone()));
                }
                if provider.trim().is_empty() {
                    return Err(StructuralError::MissingProvider(id.clone()));
                }
            }
            Node::SetVariable { id, name, value } => {
                check_name(id, name)?;
                check_expression(id, value)?;
            }
            Node::GetVariable { id, name } | Node::VariableReporter { id, name } => {
                check_name(id, name)?;
            }
            Node::VariableInput { id, expression } => check_expression(id, expression)?,
            Node::Operator { id, inputs, .. } => {
                for input in inputs {
                    check_expression(id, input)?;
                }
            }
            Node::Branch {
                id,
                condition: Condition::Expression(expr),
                ..
            } => check_expression(id, expr)?,
            _ => {}
        }

        for child in node.children() {
            check_sequence(child, false)?;
        }
    }
    Ok(())
}

fn check_name(block_id: &str, name: &str) -> Result<(), StructuralError> {
    if VariableStore::is_valid_name(name) {
        Ok(())
    } else {
        Err(StructuralError::InvalidVariableName {
            block_id: block_id.to_string(),
            name: name.to_string(),
        })
    }
}

/// Variable reads nested inside value expressions must use valid names too.
fn check_expression(block_id: &str, expr: &ValueExpr) -> Result<(), StructuralError> {
    match expr {
        ValueExpr::Variable(name) => check_name(block_id, name),
        ValueExpr::Template(_) => Ok(()),
        ValueExpr::Operation { operands, .. } => operands
            .iter()
            .try_for_each(|operand| check_expression(block_id, operand)),
    }
}

/// Logs every variable that is read somewhere but never set anywhere in the flow.
fn warn_unset_variables(nodes: &[Node]) {
    let mut set = HashSet::new();
    let mut read = HashSet::new();
    collect_variable_usage(nodes, &mut set, &mut read);

    let mut unset: Vec<_> = read.difference(&set).collect();
    unset.sort();
    for name in unset {
        warn!(
            target: TARGET,
            variable = %name,
            "Variable is read but never set; it will be missing at run time"
        );
    }
}

fn collect_variable_usage(nodes: &[Node], set: &mut HashSet<String>, read: &mut HashSet<String>) {
    for node in nodes {
        match node {
            Node::SetVariable { name, value, .. } => {
                set.insert(name.clone());
                value.referenced_variables(read);
            }
            Node::GetVariable { name, .. } | Node::VariableReporter { name, .. } => {
                read.insert(name.clone());
            }
            Node::VariableInput { expression, .. } => expression.referenced_variables(read),
            Node::Model {
                prompt_template, ..
            } => {
                for name in crate::template::placeholder_variables(prompt_template) {
                    read.insert(name);
                }
            }
            Node::Operator { inputs, .. } => {
                for input in inputs {
                    input.referenced_variables(read);
                }
            }
            Node::Branch { condition, .. } => match condition {
                Condition::Expression(expr) => expr.referenced_variables(read),
                Condition::Legacy {
                    kind: LegacyCondition::VarEquals,
                    value,
                } => {
                    let name = value.split_once('=').map_or(value.as_str(), |(name, _)| name);
                    read.insert(name.trim().to_string());
                }
                Condition::Legacy { .. } => {}
            },
            _ => {}
        }
        for child in node.children() {
            collect_variable_usage(child, set, read);
        }
    }
}
