use crate::ast::NodeKind;
use thiserror::Error;

/// Errors raised while extracting and validating a flow from a raw block graph.
///
/// Every message ends with a hint the user can act on in the editor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("The workspace is empty. Add a \"When Flow Runs\" block to get started.")]
    EmptyGraph,

    #[error("Block id '{0}' is used more than once. Every block must have a unique id.")]
    DuplicateBlockId(String),

    #[error("No \"When Flow Runs\" block found. Add one to mark where the flow begins.")]
    NoStartBlock,

    #[error(
        "Found {count} \"When Flow Runs\" blocks ({ids}). A flow must have exactly one start block; remove the extras."
    )]
    MultipleStartBlocks { count: usize, ids: String },

    #[error(
        "Block '{missing_block_id}' not found, which is referenced by block '{source_block_id}'. Reconnect or remove the broken link."
    )]
    BlockNotFound {
        missing_block_id: String,
        source_block_id: String,
    },

    #[error(
        "Found {count} disconnected block(s): {blocks}. Connect them to the flow or delete them."
    )]
    Disconnected { count: usize, blocks: String },

    #[error(
        "Block '{0}' is visited twice while walking the flow. Break the loop in its connections."
    )]
    Cycle(String),

    #[error(
        "The flow has more than {limit} blocks. Split it up or check for accidental loops in the connections."
    )]
    TooManyBlocks { limit: usize },

    #[error("Block '{block_id}' has an unknown type '{type_name}'. Replace it with a supported block.")]
    UnknownBlockType { block_id: String, type_name: String },

    #[error("Block '{block_id}' ({type_name}) cannot be used here: {message}")]
    MisplacedBlock {
        block_id: String,
        type_name: String,
        message: String,
    },

    #[error("{kind} block '{block_id}' needs a block connected to its '{slot}' input.")]
    MissingValueInput {
        block_id: String,
        kind: NodeKind,
        slot: String,
    },

    #[error("Block '{block_id}' has an invalid '{field}': {message}")]
    InvalidParameter {
        block_id: String,
        field: String,
        message: String,
    },

    #[error(
        "Block '{block_id}' uses an invalid variable name '{name}'. Names must start with a letter or underscore and contain only letters, digits and underscores."
    )]
    InvalidVariableName { block_id: String, name: String },

    #[error("The flow is empty. Add a \"When Flow Runs\" block to get started.")]
    EmptyFlow,

    #[error(
        "The flow only has a start block. Add processing blocks and finish with an \"Output Result\" block."
    )]
    IncompleteFlow,

    #[error(
        "The flow has nothing between \"When Flow Runs\" and \"Output Result\". Add at least one block in between, such as a Text Input or an LLM Processing block."
    )]
    NoContentBlocks,

    #[error("The flow must begin with a \"When Flow Runs\" block, but begins with {found}.")]
    MustStartWithStart { found: NodeKind },

    #[error(
        "The flow must end with an \"Output Result\" block, but ends with {found}. Add an output block at the end."
    )]
    MustEndWithOutput { found: NodeKind },

    #[error(
        "The {arm} branch of If block '{block_id}' must end with an \"Output Result\" block when the If block ends the flow."
    )]
    BranchMissingOutput { block_id: String, arm: String },

    #[error(
        "\"Output Result\" block '{0}' must be the last block of its sequence. Move it to the end."
    )]
    MisplacedOutput(String),

    #[error("Text Input block '{0}' is empty. Enter some text or remove the block.")]
    EmptyTextInput(String),

    #[error("LLM Processing block '{0}' has no prompt. Enter a prompt template.")]
    MissingPrompt(String),

    #[error("LLM Processing block '{0}' has no model selected. Pick a model.")]
    MissingProvider(String),
}

/// Errors produced by the operator evaluator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    #[error("Operator '{operator}' expects {expected} input(s), but got {found}")]
    Arity {
        operator: String,
        expected: usize,
        found: usize,
    },

    #[error("Operator '{operator}' expects a number, but got '{found}'")]
    NotANumber { operator: String, found: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid substring range: start {start} is greater than end {end}")]
    InvalidRange { start: usize, end: usize },
}

/// Errors produced while evaluating a value expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error("Variable \"{0}\" not found")]
    MissingVariable(String),
}

/// Failure of a boolean-expression branch condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Condition could not be evaluated: {0}")]
    Expression(#[from] ExpressionError),
}

/// Errors surfaced by the model caller and its provider backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Unknown model provider '{0}'")]
    UnknownProvider(String),

    #[error("API key for provider '{provider}' is not configured. Set the {env_var} environment variable.")]
    MissingApiKey { provider: String, env_var: String },

    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Timeout(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Per-node runtime failures. Caught by the executor and attached to the node's result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Error in {kind} block: {message}")]
    Validation { kind: NodeKind, message: String },

    #[error("Error in {kind} block: Variable \"{name}\" not found")]
    MissingVariable { kind: NodeKind, name: String },

    #[error("Error in {kind} block: Invalid variable name \"{name}\"")]
    InvalidVariableName { kind: NodeKind, name: String },

    #[error("Error in {kind} block: {source}")]
    Operator {
        kind: NodeKind,
        source: OperatorError,
    },

    #[error("Error in {kind} block: {source}")]
    Expression {
        kind: NodeKind,
        source: ExpressionError,
    },

    #[error("Error in {kind} block: {source}")]
    Condition {
        kind: NodeKind,
        source: ConditionError,
    },

    #[error("Error in {kind} block: {source}")]
    Model {
        kind: NodeKind,
        source: ProviderError,
    },
}

impl ExecutionError {
    /// Wraps an expression failure, surfacing a missing variable as its own variant.
    pub fn from_expression(kind: NodeKind, source: ExpressionError) -> Self {
        match source {
            ExpressionError::MissingVariable(name) => ExecutionError::MissingVariable { kind, name },
            other => ExecutionError::Expression {
                kind,
                source: other,
            },
        }
    }
}

/// Errors that can occur when saving or loading a flow artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read or write artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode artifact: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Failed to decode artifact: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Unsupported artifact version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
}

/// Errors that can occur when converting an editor format into a `GraphDefinition`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphConversionError {
    #[error("Failed to parse workspace JSON: {0}")]
    Json(String),

    #[error("Invalid workspace: {0}")]
    Invalid(String),
}

/// A variable name that does not match `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid variable name \"{0}\"")]
pub struct InvalidVariableName(pub String);
