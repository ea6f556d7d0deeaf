mod store;

pub use store::{Scope, VariableStore};
