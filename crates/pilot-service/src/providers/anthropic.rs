//! Anthropic Messages API provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatCompletion, ChatProvider, ChatRequest, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Anthropic chat provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    /// Create a provider using the production API endpoint.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_owned())
    }

    /// Create a provider against a custom endpoint (used in tests).
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
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

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let mut content = String::new();
        let mut thinking = None;
        for block in parsed.content {
            match block {
                ContentBlock::Text { text } => content.push_str(&text),
                ContentBlock::Thinking { thinking: t } => thinking = Some(t),
                ContentBlock::Other => {}
            }
        }

        if content.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "response contained no text content".into(),
            ));
        }

        Ok(ChatCompletion {
            content,
            thinking,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
            model: parsed.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatMessage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_messages_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "thinking", "thinking": "The player needs a jump action."},
                    {"type": "text", "text": "Added a jump."}
                ],
                "model": "claude-sonnet-4-20250514",
                "usage": {"input_tokens": 120, "output_tokens": 40}
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_base_url("key".into(), server.uri());
        let completion = provider
            .chat(ChatRequest {
                model: None,
                system: None,
                messages: vec![ChatMessage::user("make the player jump")],
                max_tokens: 1024,
            })
            .await
            .unwrap();

        assert_eq!(completion.content, "Added a jump.");
        assert_eq!(
            completion.thinking.as_deref(),
            Some("The player needs a jump action.")
        );
        assert_eq!(completion.total_tokens(), 160);
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_base_url("key".into(), server.uri());
        let err = provider
            .chat(ChatRequest::single(None, "hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 429, .. }));
    }
}
