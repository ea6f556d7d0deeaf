use super::coercion::{to_bool, to_number};
use super::engine::ExpressionEngine;
use crate::ast::{Condition, LegacyCondition, Value};
use crate::data::VariableStore;
use crate::error::{ConditionError, ProviderError};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

const TARGET: &str = "blockflow::condition";

/// The three labels a sentiment classifier may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    /// Accepts exactly one label after trimming and lowercasing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("'{}' is not one of positive, negative, neutral", other)),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote sentiment classification used by the `ai_sentiment` condition.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Sentiment, ProviderError>;
}

/// Evaluates a branch condition against the current scope.
///
/// Legacy conditions never fail: problems are logged and yield `false`.
/// Expression conditions propagate evaluation failures as [`ConditionError`].
pub async fn evaluate_condition(
    condition: &Condition,
    current_data: &str,
    variables: &VariableStore,
    line: Option<&str>,
    classifier: Option<&dyn SentimentClassifier>,
) -> Result<bool, ConditionError> {
    match condition {
        Condition::Legacy { kind, value } => {
            Ok(evaluate_legacy(kind, value, current_data, variables, classifier).await)
        }
        Condition::Expression(expr) => {
            let engine = ExpressionEngine::new(current_data, variables, line);
            let value = engine.evaluate(expr)?;
            Ok(match value {
                Value::Bool(b) => b,
                Value::Number(n) => n != 0.0,
                Value::Text(text) => to_bool(&text),
            })
        }
    }
}

/// Evaluates one of the discrete condition kinds of the classic If block.
pub async fn evaluate_legacy(
    kind: &LegacyCondition,
    value: &str,
    current_data: &str,
    variables: &VariableStore,
    classifier: Option<&dyn SentimentClassifier>,
) -> bool {
    match kind {
        LegacyCondition::TextContains => text_contains(value, current_data),
        LegacyCondition::TextLength => text_length(value, current_data),
        LegacyCondition::VarEquals => var_equals(value, variables),
        LegacyCondition::AiSentiment => ai_sentiment(value, current_data, classifier).await,
        LegacyCondition::Unsupported(name) => {
            tracing::warn!(target: TARGET, condition = %name, "Unknown condition type");
            false
        }
    }
}

fn text_contains(needle: &str, data: &str) -> bool {
    if needle.is_empty() || data.is_empty() {
        return false;
    }
    data.to_lowercase().contains(&needle.to_lowercase())
}

fn text_length(threshold: &str, data: &str) -> bool {
    match to_number(threshold) {
        Some(limit) => data.chars().count() as f64 > limit,
        None => {
            tracing::warn!(target: TARGET, threshold, "Invalid number for text_length condition");
            false
        }
    }
}

fn var_equals(pair: &str, variables: &VariableStore) -> bool {
    match pair.split_once('=') {
        Some((name, expected)) => variables.get(name.trim()) == Some(expected.trim()),
        None => variables
            .get(pair.trim())
            .is_some_and(|value| !value.is_empty()),
    }
}

async fn ai_sentiment(
    expected: &str,
    data: &str,
    classifier: Option<&dyn SentimentClassifier>,
) -> bool {
    let expected = match expected.parse::<Sentiment>() {
        Ok(sentiment) => sentiment,
        Err(reason) => {
            tracing::warn!(target: TARGET, %reason, "Invalid expected sentiment");
            return false;
        }
    };
    let Some(classifier) = classifier else {
        tracing::warn!(target: TARGET, "No sentiment classifier configured; condition is false");
        return false;
    };
    match classifier.classify(data).await {
        Ok(actual) => actual == expected,
        Err(error) => {
            tracing::warn!(target: TARGET, %error, "Sentiment classification failed; condition is false");
            false
        }
    }
}
