//! Graph Extractor: turns a raw block graph into a validated, ordered node sequence.

use crate::ast::{Node, collect_ids};
use crate::error::StructuralError;
use crate::graph::{BlockDefinition, GraphDefinition};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use std::collections::VecDeque;
use tracing::debug;

mod builder;
pub mod parsing;
mod validator;

use builder::SequenceBuilder;
pub use parsing::{BlockInputs, BlockParser};
use parsing::{create_parser_by_name, register_default_parsers};
pub use validator::validate;

const TARGET: &str = "blockflow::extractor";

/// Upper bound on the number of blocks walked in one flow.
pub const DEFAULT_MAX_BLOCKS: usize = 100;

pub struct Extractor {
    registry: AHashMap<String, Box<dyn BlockParser>>,
    max_blocks: usize,
}

pub struct ExtractorBuilder {
    registry: AHashMap<String, Box<dyn BlockParser>>,
    max_blocks: usize,
}

impl Default for ExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorBuilder {
    pub fn new() -> Self {
        let mut registry: AHashMap<String, Box<dyn BlockParser>> = AHashMap::new();
        register_default_parsers(&mut registry);
        Self {
            registry,
            max_blocks: DEFAULT_MAX_BLOCKS,
        }
    }

    /// Lets a custom block type reuse a built-in parser, e.g. `my_prompt` → `llm_block`.
    /// Unknown built-in names are ignored.
    pub fn with_type_mapping(mut self, user_type_name: &str, builtin_type_name: &str) -> Self {
        if let Some(parser) = create_parser_by_name(builtin_type_name) {
            self.registry.insert(user_type_name.to_string(), parser);
        }
        self
    }

    pub fn with_custom_parser(mut self, parser: Box<dyn BlockParser>) -> Self {
        self.registry.insert(parser.block_type().to_string(), parser);
        self
    }

    pub fn with_max_blocks(mut self, max_blocks: usize) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    pub fn build(self) -> Extractor {
        Extractor {
            registry: self.registry,
            max_blocks: self.max_blocks,
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        ExtractorBuilder::new().build()
    }
}

impl Extractor {
    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::new()
    }

    /// Extracts and validates the flow rooted at the graph's single start block.
    ///
    /// Extraction is deterministic: the same graph always yields the same sequence.
    pub fn extract(&self, graph: &GraphDefinition) -> Result<Vec<Node>, StructuralError> {
        if graph.blocks.is_empty() {
            return Err(StructuralError::EmptyGraph);
        }

        let mut index: AHashMap<&str, &BlockDefinition> = AHashMap::with_capacity(graph.blocks.len());
        for block in &graph.blocks {
            if index.insert(block.id.as_str(), block).is_some() {
                return Err(StructuralError::DuplicateBlockId(block.id.clone()));
            }
        }

        let start = self.find_start(graph)?;
        self.check_connected(graph, &index, start)?;

        let nodes = SequenceBuilder::new(&index, &self.registry, self.max_blocks)
            .build_chain(&start.id, "N/A")?;
        validate(&nodes)?;

        let mut ids = Vec::new();
        collect_ids(&nodes, &mut ids);
        debug!(
            target: TARGET,
            start = %start.id,
            top_level = nodes.len(),
            total = ids.len(),
            "Extracted flow"
        );
        Ok(nodes)
    }

    fn is_start(&self, block: &BlockDefinition) -> bool {
        self.registry
            .get(&block.block_type)
            .is_some_and(|parser| parser.is_start())
    }

    fn find_start<'g>(&self, graph: &'g GraphDefinition) -> Result<&'g BlockDefinition, StructuralError> {
        let starts: Vec<&BlockDefinition> = graph
            .blocks
            .iter()
            .filter(|block| self.is_start(block))
            .collect();
        match starts.as_slice() {
            [] => Err(StructuralError::NoStartBlock),
            [start] => Ok(*start),
            many => Err(StructuralError::MultipleStartBlocks {
                count: many.len(),
                ids: many.iter().map(|block| block.id.as_str()).join(", "),
            }),
        }
    }

    /// Every block must be reachable from the start block through slots or `next` links.
    fn check_connected(
        &self,
        graph: &GraphDefinition,
        index: &AHashMap<&str, &BlockDefinition>,
        start: &BlockDefinition,
    ) -> Result<(), StructuralError> {
        let mut reached: AHashSet<&str> = AHashSet::new();
        let mut queue = VecDeque::from([start]);
        reached.insert(start.id.as_str());

        while let Some(block) = queue.pop_front() {
            for target in block.connections() {
                let next = index
                    .get(target)
                    .copied()
                    .ok_or_else(|| StructuralError::BlockNotFound {
                        missing_block_id: target.to_string(),
                        source_block_id: block.id.clone(),
                    })?;
                if reached.insert(next.id.as_str()) {
                    queue.push_back(next);
                }
            }
        }

        let disconnected: Vec<String> = graph
            .blocks
            .iter()
            .filter(|block| !reached.contains(block.id.as_str()))
            .map(|block| format!("{} ({})", block.id, block.block_type))
            .collect();
        if disconnected.is_empty() {
            Ok(())
        } else {
            Err(StructuralError::Disconnected {
                count: disconnected.len(),
                blocks: disconnected.join(", "),
            })
        }
    }
}

/// Extracts a flow with the default parser set.
pub fn extract(graph: &GraphDefinition) -> Result<Vec<Node>, StructuralError> {
    Extractor::default().extract(graph)
}
