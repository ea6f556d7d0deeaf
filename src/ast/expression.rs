use super::node::{Condition, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A value-producing expression captured on a consuming node and evaluated lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueExpr {
    /// A literal or templated string, substituted against the current scope.
    Template(String),
    /// A direct read of a variable; fails at run time when the variable is absent.
    Variable(String),
    Operation {
        operator: OperatorKind,
        operands: Vec<ValueExpr>,
    },
}

impl ValueExpr {
    pub fn literal(text: impl Into<String>) -> Self {
        ValueExpr::Template(text.into())
    }

    /// Gets the names of all variables this expression reads, including those
    /// referenced from `{{getVar("..")}}` placeholders inside templates.
    pub fn referenced_variables(&self, names: &mut HashSet<String>) {
        match self {
            ValueExpr::Variable(name) => {
                names.insert(name.clone());
            }
            ValueExpr::Template(text) => {
                for name in crate::template::placeholder_variables(text) {
                    names.insert(name);
                }
            }
            ValueExpr::Operation { operands, .. } => {
                for operand in operands {
                    operand.referenced_variables(names);
                }
            }
        }
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Template(text) => write!(f, "\"{}\"", text),
            ValueExpr::Variable(name) => write!(f, "${}", name),
            ValueExpr::Operation { operator, operands } => {
                write!(f, "{}(", operator.as_str())?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", operand)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// The fourteen operator kinds understood by the operator evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    And,
    Or,
    Not,
    Concatenate,
    Substring,
    Length,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 14] = [
        OperatorKind::Add,
        OperatorKind::Subtract,
        OperatorKind::Multiply,
        OperatorKind::Divide,
        OperatorKind::Equals,
        OperatorKind::NotEquals,
        OperatorKind::GreaterThan,
        OperatorKind::LessThan,
        OperatorKind::And,
        OperatorKind::Or,
        OperatorKind::Not,
        OperatorKind::Concatenate,
        OperatorKind::Substring,
        OperatorKind::Length,
    ];

    /// Number of operands this operator takes.
    pub fn arity(&self) -> usize {
        match self {
            OperatorKind::Not | OperatorKind::Length => 1,
            OperatorKind::Substring => 3,
            _ => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Add => "add",
            OperatorKind::Subtract => "subtract",
            OperatorKind::Multiply => "multiply",
            OperatorKind::Divide => "divide",
            OperatorKind::Equals => "equals",
            OperatorKind::NotEquals => "not_equals",
            OperatorKind::GreaterThan => "greater_than",
            OperatorKind::LessThan => "less_than",
            OperatorKind::And => "and",
            OperatorKind::Or => "or",
            OperatorKind::Not => "not",
            OperatorKind::Concatenate => "concatenate",
            OperatorKind::Substring => "substring",
            OperatorKind::Length => "length",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    fn symbol(&self) -> &'static str {
        match self {
            OperatorKind::Add => "+",
            OperatorKind::Subtract => "-",
            OperatorKind::Multiply => "*",
            OperatorKind::Divide => "/",
            OperatorKind::Equals => "==",
            OperatorKind::NotEquals => "!=",
            OperatorKind::GreaterThan => ">",
            OperatorKind::LessThan => "<",
            OperatorKind::And => "AND",
            OperatorKind::Or => "OR",
            OperatorKind::Not => "NOT",
            OperatorKind::Concatenate => "++",
            OperatorKind::Substring => "SUBSTR",
            OperatorKind::Length => "LEN",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wrapper to display a value expression as an indented tree.
pub struct DisplayExpression<'a> {
    pub expr: &'a ValueExpr,
}

impl<'a> fmt::Display for DisplayExpression<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expr_tree(self.expr, f, "", true)
    }
}

fn fmt_expr_tree(
    expr: &ValueExpr,
    f: &mut fmt::Formatter<'_>,
    prefix: &str,
    is_last: bool,
) -> fmt::Result {
    let node_marker = if is_last { "└── " } else { "├── " };
    write!(f, "{}{}", prefix, node_marker)?;

    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

    match expr {
        ValueExpr::Template(text) => writeln!(f, "Text: \"{}\"", text)?,
        ValueExpr::Variable(name) => writeln!(f, "Variable: ${}", name)?,
        ValueExpr::Operation { operator, operands } => {
            writeln!(f, "{} ({})", operator.as_str(), operator.symbol())?;
            let count = operands.len();
            for (i, operand) in operands.iter().enumerate() {
                fmt_expr_tree(operand, f, &child_prefix, i + 1 == count)?;
            }
        }
    }
    Ok(())
}

/// A wrapper to display an extracted flow as a tree, nesting branch arms and loop bodies.
pub struct DisplayFlow<'a> {
    pub nodes: &'a [Node],
}

impl<'a> fmt::Display for DisplayFlow<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flow")?;
        fmt_sequence(self.nodes, f, "")
    }
}

fn fmt_sequence(nodes: &[Node], f: &mut fmt::Formatter<'_>, prefix: &str) -> fmt::Result {
    let count = nodes.len();
    for (i, node) in nodes.iter().enumerate() {
        fmt_node(node, f, prefix, i + 1 == count)?;
    }
    Ok(())
}

fn fmt_node(node: &Node, f: &mut fmt::Formatter<'_>, prefix: &str, is_last: bool) -> fmt::Result {
    let node_marker = if is_last { "└── " } else { "├── " };
    write!(f, "{}{}[{}] ", prefix, node_marker, node.id())?;

    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

    match node {
        Node::Start { .. } | Node::Output { .. } => writeln!(f, "{}", node.kind())?,
        Node::TextInput { value, .. } => writeln!(f, "{}: \"{}\"", node.kind(), value)?,
        Node::VariableInput { expression, .. } => {
            writeln!(f, "{}: {}", node.kind(), expression)?
        }
        Node::Model {
            provider,
            prompt_template,
            temperature,
            max_tokens,
            top_p,
            ..
        } => writeln!(
            f,
            "{} ({}, temperature={}, max_tokens={}, top_p={}): \"{}\"",
            node.kind(),
            provider,
            temperature,
            max_tokens,
            top_p,
            prompt_template
        )?,
        Node::Branch {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            writeln!(f, "{}: {}", node.kind(), condition_label(condition))?;
            fmt_arm("then", then_branch, f, &child_prefix, false)?;
            fmt_arm("else", else_branch, f, &child_prefix, true)?;
        }
        Node::ForEachLine { body, .. } => {
            writeln!(f, "{}", node.kind())?;
            fmt_arm("body", body, f, &child_prefix, true)?;
        }
        Node::SetVariable { name, value, .. } => {
            writeln!(f, "{}: {} = {}", node.kind(), name, value)?
        }
        Node::GetVariable { name, .. } | Node::VariableReporter { name, .. } => {
            writeln!(f, "{}: {}", node.kind(), name)?
        }
        Node::Operator {
            operator, inputs, ..
        } => {
            writeln!(f, "{} ({})", node.kind(), operator.symbol())?;
            let count = inputs.len();
            for (i, input) in inputs.iter().enumerate() {
                fmt_expr_tree(input, f, &child_prefix, i + 1 == count)?;
            }
        }
    }
    Ok(())
}

fn fmt_arm(
    label: &str,
    nodes: &[Node],
    f: &mut fmt::Formatter<'_>,
    prefix: &str,
    is_last: bool,
) -> fmt::Result {
    let node_marker = if is_last { "└── " } else { "├── " };
    if nodes.is_empty() {
        return writeln!(f, "{}{}{} (empty)", prefix, node_marker, label);
    }
    writeln!(f, "{}{}{}", prefix, node_marker, label)?;
    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
    fmt_sequence(nodes, f, &child_prefix)
}

fn condition_label(condition: &Condition) -> String {
    match condition {
        Condition::Legacy { .. } => condition.to_string(),
        Condition::Expression(expr) => format!("expression {}", expr),
    }
}
