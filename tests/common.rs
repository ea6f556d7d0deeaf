//! Common test utilities for building block graphs, flows and fake providers.
use async_trait::async_trait;
use blockflow::ast::{Condition, LegacyCondition, Node, ValueExpr};
use blockflow::error::ProviderError;
use blockflow::evaluator::{Sentiment, SentimentClassifier};
use blockflow::executor::FlowExecutor;
use blockflow::graph::{BlockDefinition, GraphDefinition};
use blockflow::model::{ModelBackend, ModelCaller, ModelCallerConfig, ModelRequest, ModelResponse, ProviderRegistry};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Raw graph builders ---

#[allow(dead_code)]
pub fn block(id: &str, block_type: &str) -> BlockDefinition {
    BlockDefinition::new(id, block_type)
}

#[allow(dead_code)]
pub fn start(id: &str, next: &str) -> BlockDefinition {
    block(id, "start_block").with_next(next)
}

#[allow(dead_code)]
pub fn text_input(id: &str, text: &str) -> BlockDefinition {
    block(id, "text_input_block").with_field("TEXT", text)
}

#[allow(dead_code)]
pub fn output(id: &str) -> BlockDefinition {
    block(id, "output_block")
}

#[allow(dead_code)]
pub fn llm(id: &str, provider: &str, prompt: &str) -> BlockDefinition {
    block(id, "llm_block")
        .with_field("MODEL", provider)
        .with_field("PROMPT", prompt)
}

/// Chains the blocks through their `next` links, in order.
#[allow(dead_code)]
pub fn chain(blocks: Vec<BlockDefinition>) -> Vec<BlockDefinition> {
    let ids: Vec<String> = blocks.iter().map(|b| b.id.clone()).collect();
    blocks
        .into_iter()
        .enumerate()
        .map(|(i, b)| match ids.get(i + 1) {
            Some(next) => b.with_next(next.as_str()),
            None => b,
        })
        .collect()
}

/// `start → text("I love this") → output`, the smallest useful graph.
#[allow(dead_code)]
pub fn simple_graph() -> GraphDefinition {
    GraphDefinition::new(chain(vec![
        block("s", "start_block"),
        text_input("t", "I love this"),
        output("o"),
    ]))
}

// --- Node builders ---

#[allow(dead_code)]
pub fn n_start() -> Node {
    Node::Start { id: "start".into() }
}

#[allow(dead_code)]
pub fn n_text(id: &str, value: &str) -> Node {
    Node::TextInput {
        id: id.into(),
        value: value.into(),
    }
}

#[allow(dead_code)]
pub fn n_output(id: &str) -> Node {
    Node::Output { id: id.into() }
}

#[allow(dead_code)]
pub fn n_set(id: &str, name: &str, value: &str) -> Node {
    Node::SetVariable {
        id: id.into(),
        name: name.into(),
        value: ValueExpr::literal(value),
    }
}

#[allow(dead_code)]
pub fn n_get(id: &str, name: &str) -> Node {
    Node::GetVariable {
        id: id.into(),
        name: name.into(),
    }
}

#[allow(dead_code)]
pub fn n_model(id: &str, provider: &str, prompt: &str) -> Node {
    Node::Model {
        id: id.into(),
        provider: provider.into(),
        prompt_template: prompt.into(),
        temperature: 0.7,
        max_tokens: 1024,
        top_p: 1.0,
    }
}

#[allow(dead_code)]
pub fn n_branch(id: &str, condition: &str, then_branch: Vec<Node>, else_branch: Vec<Node>) -> Node {
    Node::Branch {
        id: id.into(),
        condition: Condition::Expression(ValueExpr::literal(condition)),
        then_branch,
        else_branch,
    }
}

#[allow(dead_code)]
pub fn n_legacy_branch(
    id: &str,
    kind: LegacyCondition,
    value: &str,
    then_branch: Vec<Node>,
    else_branch: Vec<Node>,
) -> Node {
    Node::Branch {
        id: id.into(),
        condition: Condition::Legacy {
            kind,
            value: value.into(),
        },
        then_branch,
        else_branch,
    }
}

// --- Fake providers ---

/// Replies with `reply`, or echoes the prompt when `reply` is `None`. Records every prompt.
#[allow(dead_code)]
pub struct FakeBackend {
    pub reply: Option<String>,
    pub tokens: u64,
    pub prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn echo() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            tokens: 12,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            tokens: 12,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for FakeBackend {
    fn id(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let text = self
            .reply
            .clone()
            .unwrap_or_else(|| format!("echo: {}", request.prompt));
        Ok(ModelResponse {
            text,
            token_count: self.tokens,
        })
    }
}

/// Always fails with the given error.
#[allow(dead_code)]
pub struct FailingBackend(pub ProviderError);

#[async_trait]
impl ModelBackend for FailingBackend {
    fn id(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        Err(self.0.clone())
    }
}

#[allow(dead_code)]
pub struct FakeClassifier(pub Result<Sentiment, ProviderError>);

#[async_trait]
impl SentimentClassifier for FakeClassifier {
    async fn classify(&self, _text: &str) -> Result<Sentiment, ProviderError> {
        self.0.clone()
    }
}

/// A caller with no retries and a short deadline, so failing tests stay fast.
#[allow(dead_code)]
pub fn test_caller(registry: ProviderRegistry) -> ModelCaller {
    ModelCaller::new(registry).with_config(
        ModelCallerConfig::new()
            .with_request_timeout(Duration::from_secs(5))
            .with_max_retries(0),
    )
}

/// An executor whose `fake` provider is served by `backend` under the API model `fake-model`.
#[allow(dead_code)]
pub fn executor_with(backend: Arc<dyn ModelBackend>) -> FlowExecutor {
    FlowExecutor::new(test_caller(
        ProviderRegistry::new().with_backend("fake", "fake-model", backend),
    ))
}

/// An executor with no providers at all.
#[allow(dead_code)]
pub fn offline_executor() -> FlowExecutor {
    FlowExecutor::new(test_caller(ProviderRegistry::new()))
}
