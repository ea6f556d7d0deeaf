use super::conversion::IntoGraph;
use super::definition::{BlockDefinition, GraphDefinition, SlotKind};
use crate::error::GraphConversionError;
use ahash::{AHashMap, AHashSet};
use serde::Deserialize;
use serde_json::Value;

/// Input names that hold statement chains. Every other input holds a value block.
pub const STATEMENT_INPUTS: [&str; 3] = ["THEN_BLOCKS", "ELSE_BLOCKS", "CHILD_BLOCKS"];

/// A Blockly workspace as produced by `Blockly.serialization.workspaces.save`.
///
/// Top-level blocks are kept as raw JSON. Blockly nests every `next` and input
/// connection inside its parent, so a long chain is deeply nested and is
/// unpacked with an explicit stack in [`IntoGraph::into_graph`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlocklyWorkspace {
    #[serde(default)]
    pub blocks: BlocklyBlockList,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlocklyBlockList {
    #[serde(default)]
    pub blocks: Vec<Value>,
}

/// A serialized block's own fields, without its `inputs` and `next` connections.
#[derive(Debug, Clone, Deserialize)]
pub struct BlocklyBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fields: AHashMap<String, Value>,
}

impl BlocklyWorkspace {
    /// Parses a saved workspace from JSON.
    ///
    /// Nesting depth is not limited here; the extractor bounds the flow size.
    pub fn from_json(json: &str) -> Result<Self, GraphConversionError> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let workspace = Self::deserialize(&mut deserializer)
            .map_err(|e| GraphConversionError::Json(e.to_string()))?;
        deserializer
            .end()
            .map_err(|e| GraphConversionError::Json(e.to_string()))?;
        Ok(workspace)
    }
}

impl IntoGraph for BlocklyWorkspace {
    fn into_graph(self) -> Result<GraphDefinition, GraphConversionError> {
        flatten(self.blocks.blocks).map(GraphDefinition::new)
    }
}

/// Flattens nested blocks depth-first: each block, then its inputs by name, then its `next`.
fn flatten(top_level: Vec<Value>) -> Result<Vec<BlockDefinition>, GraphConversionError> {
    let mut out = Vec::new();
    let mut seen = AHashSet::new();
    let mut pending: Vec<Value> = top_level.into_iter().rev().collect();

    while let Some(mut raw) = pending.pop() {
        let inputs = take_key(&mut raw, "inputs");
        let next = take_key(&mut raw, "next");
        let block = BlocklyBlock::deserialize(raw)
            .map_err(|e| GraphConversionError::Invalid(format!("malformed block: {}", e)))?;

        if block.id.is_empty() {
            return Err(GraphConversionError::Invalid(format!(
                "a '{}' block has no id",
                block.block_type
            )));
        }
        if !seen.insert(block.id.clone()) {
            return Err(GraphConversionError::Invalid(format!(
                "block id '{}' appears more than once",
                block.id
            )));
        }

        let mut definition = BlockDefinition::new(block.id, block.block_type);
        definition.fields = block.fields;

        let mut children = Vec::new();
        if let Some(Value::Object(inputs)) = inputs {
            let mut inputs: Vec<(String, Value)> = inputs.into_iter().collect();
            inputs.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, connection) in inputs {
                if let Some(child) = connected_block(connection) {
                    let kind = if STATEMENT_INPUTS.contains(&name.as_str()) {
                        SlotKind::Statement
                    } else {
                        SlotKind::Value
                    };
                    definition = definition.with_slot(name, kind, block_id(&child));
                    children.push(child);
                }
            }
        }
        if let Some(child) = next.and_then(connected_block) {
            definition = definition.with_next(block_id(&child));
            children.push(child);
        }

        out.push(definition);
        pending.extend(children.into_iter().rev());
    }
    Ok(out)
}

fn take_key(raw: &mut Value, key: &str) -> Option<Value> {
    raw.as_object_mut()?.remove(key)
}

/// The block attached to a connection. Shadow blocks are ignored.
fn connected_block(connection: Value) -> Option<Value> {
    match connection {
        Value::Object(mut map) => map.remove("block").filter(|block| !block.is_null()),
        _ => None,
    }
}

fn block_id(block: &Value) -> String {
    block
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
