use super::{AnthropicBackend, ModelBackend, OpenAiBackend};
use crate::error::ProviderError;
use ahash::AHashMap;
use std::sync::Arc;

const TARGET: &str = "blockflow::model";

/// The wire API family a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAi,
    Groq,
    Anthropic,
}

impl BackendKind {
    pub fn key_env(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "OPENAI_API_KEY",
            BackendKind::Groq => "GROQ_API_KEY",
            BackendKind::Anthropic => "CLAUDE_API_KEY",
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "OPENAI_BASE_URL",
            BackendKind::Groq => "GROQ_BASE_URL",
            BackendKind::Anthropic => "CLAUDE_BASE_URL",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "https://api.openai.com/v1",
            BackendKind::Groq => "https://api.groq.com/openai/v1",
            BackendKind::Anthropic => "https://api.anthropic.com",
        }
    }

    fn build(&self, api_key: String, base_url: String) -> Arc<dyn ModelBackend> {
        match self {
            BackendKind::OpenAi => Arc::new(OpenAiBackend::new("openai", api_key, base_url)),
            BackendKind::Groq => Arc::new(OpenAiBackend::new("groq", api_key, base_url)),
            BackendKind::Anthropic => Arc::new(AnthropicBackend::new(api_key, base_url)),
        }
    }
}

/// A provider name as selected on a model block, and the API model it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub backend: BackendKind,
    pub api_model: &'static str,
}

/// Providers offered by the model block's dropdown.
pub const PRESETS: [ProviderPreset; 4] = [
    ProviderPreset {
        name: "openai",
        backend: BackendKind::OpenAi,
        api_model: "gpt-4",
    },
    ProviderPreset {
        name: "groq",
        backend: BackendKind::Groq,
        api_model: "llama3-70b-8192",
    },
    ProviderPreset {
        name: "claude",
        backend: BackendKind::Anthropic,
        api_model: "claude-3-haiku-20240307",
    },
    ProviderPreset {
        name: "mixtral",
        backend: BackendKind::Groq,
        api_model: "mistral-saba-24b",
    },
];

enum Slot {
    Ready(Arc<dyn ModelBackend>),
    /// Known provider whose API key is missing; holds the env var to set.
    Unconfigured(&'static str),
}

struct ProviderEntry {
    api_model: String,
    slot: Slot,
}

/// Maps provider names to configured backends.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: AHashMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from `OPENAI_API_KEY`, `GROQ_API_KEY`, `CLAUDE_API_KEY`
    /// and the matching `*_BASE_URL` overrides.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the registry from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut registry = Self::new();
        for preset in PRESETS {
            let kind = preset.backend;
            let slot = match lookup(kind.key_env()).filter(|key| !key.trim().is_empty()) {
                Some(api_key) => {
                    let base_url = lookup(kind.base_url_env())
                        .unwrap_or_else(|| kind.default_base_url().to_string());
                    Slot::Ready(kind.build(api_key, base_url))
                }
                None => {
                    tracing::debug!(target: TARGET, provider = preset.name, env_var = kind.key_env(), "Provider not configured");
                    Slot::Unconfigured(kind.key_env())
                }
            };
            registry.providers.insert(
                preset.name.to_string(),
                ProviderEntry {
                    api_model: preset.api_model.to_string(),
                    slot,
                },
            );
        }
        registry
    }

    /// Registers (or replaces) a provider with an explicit backend.
    pub fn with_backend(
        mut self,
        name: impl Into<String>,
        api_model: impl Into<String>,
        backend: Arc<dyn ModelBackend>,
    ) -> Self {
        self.providers.insert(
            name.into(),
            ProviderEntry {
                api_model: api_model.into(),
                slot: Slot::Ready(backend),
            },
        );
        self
    }

    /// Resolves a provider name to its backend and API model name.
    pub fn resolve(&self, provider: &str) -> Result<(Arc<dyn ModelBackend>, &str), ProviderError> {
        let entry = self
            .providers
            .get(provider)
            .ok_or_else(|| ProviderError::UnknownProvider(provider.to_string()))?;
        match &entry.slot {
            Slot::Ready(backend) => Ok((Arc::clone(backend), entry.api_model.as_str())),
            Slot::Unconfigured(env_var) => Err(ProviderError::MissingApiKey {
                provider: provider.to_string(),
                env_var: env_var.to_string(),
            }),
        }
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    /// Names of all registered providers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_leave_providers_unconfigured() {
        let registry = ProviderRegistry::from_lookup(|key| {
            (key == "GROQ_API_KEY").then(|| "gsk-test".to_string())
        });
        assert_eq!(registry.names(), vec!["claude", "groq", "mixtral", "openai"]);

        let (backend, model) = registry.resolve("mixtral").unwrap();
        assert_eq!(backend.id(), "groq");
        assert_eq!(model, "mistral-saba-24b");

        let err = registry.resolve("openai").err().unwrap();
        assert_eq!(
            err,
            ProviderError::MissingApiKey {
                provider: "openai".into(),
                env_var: "OPENAI_API_KEY".into()
            }
        );
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.resolve("bad-provider"),
            Err(ProviderError::UnknownProvider(name)) if name == "bad-provider"
        ));
    }
}
