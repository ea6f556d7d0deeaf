use crate::ast::{Node, ValueExpr};
use crate::error::StructuralError;
use crate::extractor::parsing::{BlockInputs, BlockParser};
use crate::graph::{BlockDefinition, SlotKind};
use ahash::{AHashMap, AHashSet};

/// Walks `next` chains and input slots, turning raw blocks into ordered node sequences.
pub(super) struct SequenceBuilder<'a> {
    blocks: &'a AHashMap<&'a str, &'a BlockDefinition>,
    registry: &'a AHashMap<String, Box<dyn BlockParser>>,
    visited: AHashSet<String>,
    max_blocks: usize,
}

impl<'a> SequenceBuilder<'a> {
    pub(super) fn new(
        blocks: &'a AHashMap<&'a str, &'a BlockDefinition>,
        registry: &'a AHashMap<String, Box<dyn BlockParser>>,
        max_blocks: usize,
    ) -> Self {
        Self {
            blocks,
            registry,
            visited: AHashSet::new(),
            max_blocks,
        }
    }

    /// Builds the statement chain starting at `first`, following `next` links to the end.
    pub(super) fn build_chain(
        &mut self,
        first: &str,
        source_id: &str,
    ) -> Result<Vec<Node>, StructuralError> {
        let mut nodes = Vec::new();
        let mut current = Some(first.to_string());
        let mut previous = source_id.to_string();

        while let Some(block_id) = current {
            let block = self.enter(&block_id, &previous)?;
            let parser = self.parser_for(block)?;
            let inputs = self.collect_inputs(block)?;
            nodes.push(parser.parse(block, inputs)?);

            current = block.next.clone();
            previous = block_id;
        }
        Ok(nodes)
    }

    /// Builds the value expression for a block plugged into another block's input.
    fn build_value(&mut self, block_id: &str, source_id: &str) -> Result<ValueExpr, StructuralError> {
        let block = self.enter(block_id, source_id)?;
        let parser = self.parser_for(block)?;
        let inputs = self.collect_inputs(block)?;
        parser.parse_value(block, inputs)
    }

    fn collect_inputs(&mut self, block: &BlockDefinition) -> Result<BlockInputs, StructuralError> {
        let mut inputs = BlockInputs::default();
        for slot in &block.inputs {
            match slot.kind {
                SlotKind::Statement => {
                    let chain = self.build_chain(&slot.target, &block.id)?;
                    inputs.statements.insert(slot.name.clone(), chain);
                }
                SlotKind::Value => {
                    let value = self.build_value(&slot.target, &block.id)?;
                    inputs.values.insert(slot.name.clone(), value);
                }
            }
        }
        Ok(inputs)
    }

    /// Marks a block as visited, rejecting revisits and oversized flows.
    fn enter(&mut self, block_id: &str, source_id: &str) -> Result<&'a BlockDefinition, StructuralError> {
        if !self.visited.insert(block_id.to_string()) {
            return Err(StructuralError::Cycle(block_id.to_string()));
        }
        if self.visited.len() > self.max_blocks {
            return Err(StructuralError::TooManyBlocks {
                limit: self.max_blocks,
            });
        }
        self.find_block(block_id, source_id)
    }

    fn find_block(&self, block_id: &str, source_id: &str) -> Result<&'a BlockDefinition, StructuralError> {
        self.blocks
            .get(block_id)
            .copied()
            .ok_or_else(|| StructuralError::BlockNotFound {
                missing_block_id: block_id.to_string(),
                source_block_id: source_id.to_string(),
            })
    }

    fn parser_for(&self, block: &BlockDefinition) -> Result<&'a dyn BlockParser, StructuralError> {
        self.registry
            .get(&block.block_type)
            .map(|parser| parser.as_ref())
            .ok_or_else(|| StructuralError::UnknownBlockType {
                block_id: block.id.clone(),
                type_name: block.block_type.clone(),
            })
    }
}
