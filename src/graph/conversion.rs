use super::definition::GraphDefinition;
use crate::error::GraphConversionError;

/// A trait for editor formats that can be converted into a blockflow `GraphDefinition`.
///
/// Implement this on your own workspace structs to feed a different editor's
/// serialization into the extractor.
///
/// # Example
///
/// ```rust,no_run
/// use blockflow::error::GraphConversionError;
/// use blockflow::graph::{BlockDefinition, GraphDefinition, IntoGraph};
///
/// struct MyBlock { id: String, kind: String, below: Option<String> }
/// struct MyCanvas { blocks: Vec<MyBlock> }
///
/// impl IntoGraph for MyCanvas {
///     fn into_graph(self) -> Result<GraphDefinition, GraphConversionError> {
///         let blocks = self
///             .blocks
///             .into_iter()
///             .map(|b| {
///                 let block = BlockDefinition::new(b.id, b.kind);
///                 match b.below {
///                     Some(next) => block.with_next(next),
///                     None => block,
///                 }
///             })
///             .collect();
///         Ok(GraphDefinition::new(blocks))
///     }
/// }
/// ```
pub trait IntoGraph {
    /// Consumes the object and converts it into a raw block graph.
    fn into_graph(self) -> Result<GraphDefinition, GraphConversionError>;
}

impl IntoGraph for GraphDefinition {
    fn into_graph(self) -> Result<GraphDefinition, GraphConversionError> {
        Ok(self)
    }
}
