pub mod artifact;
pub mod blockly;
pub mod conversion;
pub mod definition;

pub use artifact::*;
pub use blockly::BlocklyWorkspace;
pub use conversion::*;
pub use definition::*;
