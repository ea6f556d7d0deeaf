//! # Blockflow - Block Flow Extraction and Execution Engine
//!
//! **Blockflow** turns a visual block program (a start trigger, text inputs, model
//! calls, branches, loops, variables, operators and an output) into a validated,
//! nested node sequence and runs it. A single data value and a variable store are
//! threaded through the steps, model calls are delegated to external providers, and
//! every node reports its own result.
//!
//! ## Core Workflow
//!
//! The engine is editor-agnostic. It operates on a canonical raw graph model, the
//! [`graph::GraphDefinition`]. The primary workflow is:
//!
//! 1.  **Load Your Workspace**: Parse the editor's saved format, e.g. with [`graph::BlocklyWorkspace`].
//! 2.  **Convert to the Graph Model**: Implement the `IntoGraph` trait for your own format, or use the Blockly converter.
//! 3.  **Extract**: Use `Extractor::builder` to walk the graph from its start block. Structural problems are reported up front.
//! 4.  **Execute**: Create a `FlowExecutor` with a `ModelCaller` and run the extracted nodes. Runtime problems stay local to the failing node.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blockflow::prelude::*;
//! use blockflow::graph::{BlocklyWorkspace, IntoGraph};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let json = std::fs::read_to_string("path/to/workspace.json")?;
//!     let graph = BlocklyWorkspace::from_json(&json)?.into_graph()?;
//!
//!     // Extract the flow. Custom editor block types can reuse built-in parsers.
//!     let extractor = Extractor::builder()
//!         .with_type_mapping("my_prompt_block", "llm_block")
//!         .build();
//!     let nodes = extractor.extract(&graph)?;
//!     println!("{}", DisplayFlow { nodes: &nodes });
//!
//!     // Providers read their API keys from the environment.
//!     let caller = ModelCaller::new(ProviderRegistry::from_env());
//!     let executor = FlowExecutor::new(caller);
//!     let run = executor.run(&nodes).await;
//!
//!     println!("{}", ResultFormatter::format_results(&run.results));
//!     println!("Final data: {}", run.data);
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod extractor;
pub mod graph;
pub mod model;
pub mod prelude;
pub mod template;
pub mod trace;
