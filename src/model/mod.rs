//! Model Caller: provider resolution, HTTP backends and the call policy around them.

mod anthropic;
mod caller;
mod config;
mod openai;
mod registry;
mod sentiment;

pub use anthropic::AnthropicBackend;
pub use caller::{ModelCall, ModelCaller, ModelOptions};
pub use config::ModelCallerConfig;
pub use openai::OpenAiBackend;
pub use registry::{BackendKind, PRESETS, ProviderPreset, ProviderRegistry};
pub use sentiment::ModelSentimentClassifier;

use crate::error::ProviderError;
use async_trait::async_trait;

/// A normalized completion request sent to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// The provider-side model name, e.g. `gpt-4`.
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: Option<f64>,
}

/// A normalized completion response.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub token_count: u64,
}

/// One concrete provider API.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn id(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError>;
}

/// Rough token estimate used when a provider reports no usage: one token per four characters.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
