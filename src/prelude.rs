//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the blockflow crate.
//! Import this module to get access to the core functionality without having to import
//! each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use blockflow::prelude::*;
//!
//! # async fn run_example(graph: blockflow::graph::GraphDefinition) -> Result<()> {
//! let nodes = Extractor::default().extract(&graph)?;
//! let executor = FlowExecutor::new(ModelCaller::new(ProviderRegistry::from_env()));
//! let run = executor.run(&nodes).await;
//! println!("{}", ResultFormatter::format_results(&run.results));
//! # Ok(())
//! # }
//! ```

// Extraction and execution
pub use crate::executor::{ExecutionResult, FlowExecutor, FlowRun, RunResults};
pub use crate::extractor::{Extractor, ExtractorBuilder};

// Node model
pub use crate::ast::{Condition, DisplayFlow, Node, NodeKind, OperatorKind, Value, ValueExpr};

// State threaded through a run
pub use crate::data::{Scope, VariableStore};

// Model providers
pub use crate::model::{ModelCaller, ModelCallerConfig, ModelSentimentClassifier, ProviderRegistry};

// Error types
pub use crate::error::{ExecutionError, ProviderError, StructuralError};

// Result formatting
pub use crate::trace::ResultFormatter;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
