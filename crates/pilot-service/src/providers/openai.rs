//! OpenAI-compatible chat provider.
//!
//! Covers both the hosted OpenAI API and local Ollama instances, which expose
//! the same `/v1/chat/completions` surface.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatCompletion, ChatProvider, ChatRequest, ProviderError};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
const OLLAMA_DEFAULT_MODEL: &str = "llama3.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Provider for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    name: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
}

impl OpenAiProvider {
    /// The hosted OpenAI API.
    #[must_use]
    pub fn openai(api_key: String) -> Self {
        Self::custom(
            "openai",
            OPENAI_BASE_URL.to_owned(),
            Some(api_key),
            OPENAI_DEFAULT_MODEL.to_owned(),
        )
    }

    /// A local Ollama instance (no credentials).
    #[must_use]
    pub fn ollama(base_url: String) -> Self {
        Self::custom("ollama", base_url, None, OLLAMA_DEFAULT_MODEL.to_owned())
    }

    /// Arbitrary OpenAI-compatible endpoint.
    #[must_use]
    pub fn custom(
        name: &str,
        base_url: String,
        api_key: Option<String>,
        default_model: String,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            name: name.to_owned(),
            base_url,
            api_key,
            default_model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Option<CompletionsUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionsUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        // The chat completions API carries the system prompt as a message.
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        for message in &request.messages {
            messages.push(json!({"role": message.role, "content": message.content}));
        }

        let body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "messages": messages,
        });

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("response had no choices".into()))?;

        let usage = parsed.usage.unwrap_or(CompletionsUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        Ok(ChatCompletion {
            content,
            thinking: None,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            model: parsed.model,
        })
    }
}
