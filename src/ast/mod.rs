mod expression;
mod node;
mod value;

pub use expression::{DisplayExpression, DisplayFlow, OperatorKind, ValueExpr};
pub use node::{Condition, LegacyCondition, Node, NodeKind, collect_ids};
pub use value::Value;
