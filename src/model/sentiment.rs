use super::{ModelBackend, ModelRequest, ProviderRegistry};
use crate::error::ProviderError;
use crate::evaluator::{Sentiment, SentimentClassifier};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a sentiment analysis assistant. Analyze the sentiment of the given text and respond with exactly one word: \"positive\", \"negative\", or \"neutral\". Do not include any other text or explanation.";

const CLASSIFIER_MODEL: &str = "gpt-3.5-turbo";

/// Sentiment classification through a chat model.
pub struct ModelSentimentClassifier {
    backend: Arc<dyn ModelBackend>,
    model: String,
    timeout: Duration,
}

impl ModelSentimentClassifier {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            model: CLASSIFIER_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Uses the registry's `openai` backend.
    pub fn from_registry(registry: &ProviderRegistry) -> Result<Self, ProviderError> {
        let (backend, _) = registry.resolve("openai")?;
        Ok(Self::new(backend))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SentimentClassifier for ModelSentimentClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, ProviderError> {
        let request = ModelRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
            system: Some(SYSTEM_PROMPT.to_string()),
            temperature: 0.0,
            max_tokens: 10,
            top_p: None,
        };
        let response = tokio::time::timeout(self.timeout, self.backend.complete(&request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_millis() as u64))??;
        response
            .text
            .parse::<Sentiment>()
            .map_err(ProviderError::InvalidResponse)
    }
}
