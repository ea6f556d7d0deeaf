use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// The raw block graph handed to the extractor.
/// This is the target structure for any editor format conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub blocks: Vec<BlockDefinition>,
}

impl GraphDefinition {
    pub fn new(blocks: Vec<BlockDefinition>) -> Self {
        Self { blocks }
    }
}

/// A single block placed in the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub id: String,
    pub block_type: String,
    /// Literal field values (text boxes, dropdowns, numbers).
    #[serde(default)]
    pub fields: AHashMap<String, serde_json::Value>,
    /// Connected inputs, in declaration order.
    #[serde(default)]
    pub inputs: Vec<SlotDefinition>,
    /// The block snapped below this one, if any.
    #[serde(default)]
    pub next: Option<String>,
}

/// Whether an input slot holds a chain of statements or a single value block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    Statement,
    Value,
}

/// A named input slot and the id of the block connected to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub name: String,
    pub kind: SlotKind,
    pub target: String,
}

impl BlockDefinition {
    pub fn new(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            fields: AHashMap::new(),
            inputs: Vec::new(),
            next: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_statement(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_slot(name, SlotKind::Statement, target)
    }

    pub fn with_value(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_slot(name, SlotKind::Value, target)
    }

    pub fn with_slot(
        mut self,
        name: impl Into<String>,
        kind: SlotKind,
        target: impl Into<String>,
    ) -> Self {
        self.inputs.push(SlotDefinition {
            name: name.into(),
            kind,
            target: target.into(),
        });
        self
    }

    /// Reads a field as text. Numbers and booleans are rendered, null reads as absent.
    pub fn field_str(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Reads a numeric field, accepting numbers and numeric strings.
    pub fn field_f64(&self, name: &str) -> Option<Result<f64, String>> {
        match self.fields.get(name)? {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Ok)
                .or_else(|| Some(Err(n.to_string()))),
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.trim().parse::<f64>().map_err(|_| s.clone())),
            serde_json::Value::Null => None,
            other => Some(Err(other.to_string())),
        }
    }

    /// The target of the named slot, if connected.
    pub fn slot(&self, name: &str) -> Option<&SlotDefinition> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    /// All connected block ids: every slot target followed by `next`.
    pub fn connections(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .map(|slot| slot.target.as_str())
            .chain(self.next.as_deref())
    }
}
