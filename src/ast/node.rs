use super::ValueExpr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One extracted block instance. Branch arms and loop bodies nest as ordered sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Start {
        id: String,
    },
    TextInput {
        id: String,
        value: String,
    },
    VariableInput {
        id: String,
        expression: ValueExpr,
    },
    Model {
        id: String,
        provider: String,
        prompt_template: String,
        temperature: f64,
        max_tokens: u32,
        top_p: f64,
    },
    Output {
        id: String,
    },
    Branch {
        id: String,
        condition: Condition,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    ForEachLine {
        id: String,
        body: Vec<Node>,
    },
    SetVariable {
        id: String,
        name: String,
        value: ValueExpr,
    },
    GetVariable {
        id: String,
        name: String,
    },
    VariableReporter {
        id: String,
        name: String,
    },
    Operator {
        id: String,
        operator: super::OperatorKind,
        inputs: Vec<ValueExpr>,
    },
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Start { id }
            | Node::TextInput { id, .. }
            | Node::VariableInput { id, .. }
            | Node::Model { id, .. }
            | Node::Output { id }
            | Node::Branch { id, .. }
            | Node::ForEachLine { id, .. }
            | Node::SetVariable { id, .. }
            | Node::GetVariable { id, .. }
            | Node::VariableReporter { id, .. }
            | Node::Operator { id, .. } => id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Start { .. } => NodeKind::Start,
            Node::TextInput { .. } => NodeKind::TextInput,
            Node::VariableInput { .. } => NodeKind::VariableInput,
            Node::Model { .. } => NodeKind::Model,
            Node::Output { .. } => NodeKind::Output,
            Node::Branch { .. } => NodeKind::Branch,
            Node::ForEachLine { .. } => NodeKind::ForEachLine,
            Node::SetVariable { .. } => NodeKind::SetVariable,
            Node::GetVariable { .. } => NodeKind::GetVariable,
            Node::VariableReporter { .. } => NodeKind::VariableReporter,
            Node::Operator { .. } => NodeKind::Operator,
        }
    }

    /// Nested sequences owned by this node, in declaration order.
    pub fn children(&self) -> Vec<&[Node]> {
        match self {
            Node::Branch {
                then_branch,
                else_branch,
                ..
            } => vec![then_branch.as_slice(), else_branch.as_slice()],
            Node::ForEachLine { body, .. } => vec![body.as_slice()],
            _ => Vec::new(),
        }
    }
}

/// Collects the ids of every node in `nodes`, depth first, including nested bodies.
pub fn collect_ids(nodes: &[Node], ids: &mut Vec<String>) {
    for node in nodes {
        ids.push(node.id().to_string());
        for child in node.children() {
            collect_ids(child, ids);
        }
    }
}

/// The discriminant of a [`Node`], used for messages and result records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Start,
    TextInput,
    VariableInput,
    Model,
    Output,
    Branch,
    ForEachLine,
    SetVariable,
    GetVariable,
    VariableReporter,
    Operator,
}

impl NodeKind {
    /// The label the editor shows for this kind of block.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "When Flow Runs",
            NodeKind::TextInput => "Text Input",
            NodeKind::VariableInput => "Variable Input",
            NodeKind::Model => "LLM Processing",
            NodeKind::Output => "Output Result",
            NodeKind::Branch => "If/Then/Else",
            NodeKind::ForEachLine => "For Each Line",
            NodeKind::SetVariable => "Set Variable",
            NodeKind::GetVariable => "Get Variable",
            NodeKind::VariableReporter => "Variable Reporter",
            NodeKind::Operator => "Operator",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The predicate guarding a [`Node::Branch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Legacy {
        kind: LegacyCondition,
        value: String,
    },
    Expression(ValueExpr),
}

/// Discrete condition kinds offered by the classic If block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyCondition {
    TextContains,
    TextLength,
    VarEquals,
    AiSentiment,
    /// A kind the editor produced but this engine does not know; always false.
    Unsupported(String),
}

impl LegacyCondition {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "text_contains" => LegacyCondition::TextContains,
            "text_length" => LegacyCondition::TextLength,
            "var_equals" => LegacyCondition::VarEquals,
            "ai_sentiment" => LegacyCondition::AiSentiment,
            other => LegacyCondition::Unsupported(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LegacyCondition::TextContains => "text_contains",
            LegacyCondition::TextLength => "text_length",
            LegacyCondition::VarEquals => "var_equals",
            LegacyCondition::AiSentiment => "ai_sentiment",
            LegacyCondition::Unsupported(name) => name,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Legacy { kind, value } => match kind {
                LegacyCondition::TextContains => write!(f, "text contains \"{}\"", value),
                LegacyCondition::TextLength => write!(f, "text length > {}", value),
                LegacyCondition::VarEquals => match value.split_once('=') {
                    Some((name, expected)) => write!(
                        f,
                        "variable \"{}\" equals \"{}\"",
                        name.trim(),
                        expected.trim()
                    ),
                    None => write!(f, "variable \"{}\" exists", value.trim()),
                },
                LegacyCondition::AiSentiment => write!(f, "AI sentiment is {}", value),
                LegacyCondition::Unsupported(name) => write!(f, "unknown condition: {}", name),
            },
            Condition::Expression(expr) => write!(f, "{}", expr),
        }
    }
}
