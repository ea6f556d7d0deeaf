use super::{ModelBackend, ModelRequest, ModelResponse, estimate_tokens};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "2023-06-01";

/// Backend for the Anthropic messages API.
pub struct AnthropicBackend {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| ProviderError::Transport(e.to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn map_error(status: u16, body: &str, model: &str) -> ProviderError {
        let message = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope.error.message,
            Err(_) if body.trim().is_empty() => format!("HTTP {} (model: {})", status, model),
            Err(_) => body.to_string(),
        };
        ProviderError::Api { status, message }
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    fn id(&self) -> &str {
        "claude"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let payload = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .headers(self.build_headers()?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::map_error(status.as_u16(), &text, &request.model));
        }

        let body: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let content = body
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ProviderError::InvalidResponse("response has no text content".into()))?;

        let reported = body
            .usage
            .map(|usage| usage.input_tokens + usage.output_tokens)
            .unwrap_or(0);
        let token_count = if reported > 0 {
            reported
        } else {
            estimate_tokens(&request.prompt) + estimate_tokens(&content)
        };

        Ok(ModelResponse {
            text: content,
            token_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn request() -> ModelRequest {
        ModelRequest {
            model: "claude-3-haiku-20240307".into(),
            prompt: "Summarize".into(),
            system: None,
            temperature: 0.2,
            max_tokens: 256,
            top_p: Some(1.0),
        }
    }

    #[tokio::test]
    async fn sums_input_and_output_tokens() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "secret")
            .match_header("anthropic-version", API_VERSION)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"content": [{"type": "text", "text": "Short."}], "usage": {"input_tokens": 10, "output_tokens": 3}}"#,
            )
            .create_async()
            .await;

        let backend = AnthropicBackend::new("secret", server.url());
        let response = backend.complete(&request()).await.unwrap();
        assert_eq!(response.text, "Short.");
        assert_eq!(response.token_count, 13);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retryable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#)
            .create_async()
            .await;

        let backend = AnthropicBackend::new("secret", server.url());
        let err = backend.complete(&request()).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Api {
                status: 529,
                message: "Overloaded".into()
            }
        );
        assert!(err.is_retryable());
    }
}
