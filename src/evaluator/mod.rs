//! Operator, expression and condition evaluation.

mod coercion;
mod condition;
mod engine;
mod operators;

pub use coercion::{to_bool, to_number};
pub use condition::{
    Sentiment, SentimentClassifier, evaluate_condition, evaluate_legacy,
};
pub use engine::ExpressionEngine;
pub use operators::{evaluate, evaluate_with_variables};
