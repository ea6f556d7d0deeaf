use super::{ModelCallerConfig, ModelRequest, ModelResponse, ProviderRegistry};
use crate::error::ProviderError;
use std::sync::Arc;
use std::time::Instant;

const TARGET: &str = "blockflow::model";

/// Sampling options taken from a model block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            top_p: 1.0,
        }
    }
}

/// The outcome of one model call, including retries.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCall {
    pub text: String,
    pub token_count: u64,
    /// The API model the provider resolved to.
    pub model: String,
    /// Wall-clock time around the whole call.
    pub latency_ms: u64,
}

/// Resolves providers and applies the deadline and retry policy around backend calls.
#[derive(Clone)]
pub struct ModelCaller {
    registry: Arc<ProviderRegistry>,
    config: ModelCallerConfig,
}

impl ModelCaller {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            config: ModelCallerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ModelCallerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ModelCallerConfig {
        &self.config
    }

    /// Sends `prompt` to `provider` and returns the normalized response.
    pub async fn call(
        &self,
        prompt: &str,
        provider: &str,
        options: ModelOptions,
    ) -> Result<ModelCall, ProviderError> {
        let started = Instant::now();
        let (backend, api_model) = self.registry.resolve(provider)?;
        let request = ModelRequest {
            model: api_model.to_string(),
            prompt: prompt.to_string(),
            system: None,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: Some(options.top_p),
        };

        let mut attempt = 0;
        let response: ModelResponse = loop {
            let outcome =
                match tokio::time::timeout(self.config.request_timeout, backend.complete(&request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(
                        self.config.request_timeout.as_millis() as u64,
                    )),
                };
            match outcome {
                Ok(response) => break response,
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.backoff_for(attempt);
                    tracing::warn!(
                        target: TARGET,
                        provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "Retrying model call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            target: TARGET,
            provider,
            model = %request.model,
            latency_ms,
            tokens = response.token_count,
            "Model call completed"
        );

        Ok(ModelCall {
            text: response.text,
            token_count: response.token_count,
            model: request.model,
            latency_ms,
        })
    }
}
