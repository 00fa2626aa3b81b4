//! AI chat providers.
//!
//! Each provider adapts one upstream chat API to the `ChatProvider` trait.
//! The registry is built from configuration at startup; requests name a
//! provider or fall back to the default.

pub mod anthropic;
pub mod openai;
#[cfg(any(test, feature = "test-auth"))]
pub mod static_;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
#[cfg(any(test, feature = "test-auth"))]
pub use static_::StaticProvider;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;

/// Upper bound on completion length requested from providers.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// One message in a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "user" or "assistant".
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    /// An assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// A chat request in provider-neutral form.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model override; the provider default applies when `None`.
    pub model: Option<String>,
    /// System prompt.
    pub system: Option<String>,
    /// Conversation messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Maximum completion tokens.
    pub max_tokens: u32,
}

impl ChatRequest {
    /// A single-turn request with an optional system prompt.
    #[must_use]
    pub fn single(system: Option<String>, user_message: impl Into<String>) -> Self {
        Self {
            model: None,
            system,
            messages: vec![ChatMessage::user(user_message)],
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// A completed chat response with actual token usage.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    /// Assistant reply text.
    pub content: String,
    /// Reasoning narrative, when the provider returned one.
    pub thinking: Option<String>,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens consumed.
    pub output_tokens: u64,
    /// Model that produced the reply.
    pub model: String,
}

impl ChatCompletion {
    /// Total tokens consumed by the call.
    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Provider call failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure.
    #[error("request to provider failed: {0}")]
    Http(String),

    /// The provider returned a non-success status.
    #[error("provider returned {status}: {message}")]
    Api {
        /// HTTP status from the provider.
        status: u16,
        /// Provider error message.
        message: String,
    },

    /// The provider response could not be interpreted.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// A chat backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable provider name used in requests and transaction metadata.
    fn name(&self) -> &str;

    /// Model used when the request does not name one.
    fn default_model(&self) -> &str;

    /// Execute a chat request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError>;
}

/// Registry of configured providers.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
    default: Option<String>,
}

impl ProviderRegistry {
    /// Build the registry from configuration. Providers without credentials
    /// are simply absent.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            default: None,
        };

        if let Some(key) = &config.anthropic_api_key {
            registry.insert(Arc::new(AnthropicProvider::new(key.clone())));
        }
        if let Some(key) = &config.openai_api_key {
            registry.insert(Arc::new(OpenAiProvider::openai(key.clone())));
        }
        if let Some(base_url) = &config.ollama_base_url {
            registry.insert(Arc::new(OpenAiProvider::ollama(base_url.clone())));
        }

        if registry.providers.is_empty() {
            tracing::warn!("no AI providers configured - chat endpoints will fail");
        } else {
            tracing::info!(providers = ?registry.names(), "AI providers configured");
        }

        registry
    }

    /// An empty registry. Used together with `insert` by test setups.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            default: None,
        }
    }

    /// Register a provider. The first registration becomes the default.
    pub fn insert(&mut self, provider: Arc<dyn ChatProvider>) {
        let name = provider.name().to_owned();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    /// Look up a provider by name, or the default when `None`.
    #[must_use]
    pub fn get(&self, name: Option<&str>) -> Option<Arc<dyn ChatProvider>> {
        let name = name.or(self.default.as_deref())?;
        self.providers.get(name).cloned()
    }

    /// Names of all registered providers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// The default provider name, if any provider is registered.
    #[must_use]
    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_default_is_first_insert() {
        let mut registry = ProviderRegistry::empty();
        assert!(registry.get(None).is_none());

        registry.insert(Arc::new(StaticProvider::new()));
        assert_eq!(registry.default_name(), Some("static"));
        assert!(registry.get(None).is_some());
        assert!(registry.get(Some("static")).is_some());
        assert!(registry.get(Some("missing")).is_none());
    }
}
