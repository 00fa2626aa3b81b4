//! Deterministic in-process provider for tests and local development.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatCompletion, ChatProvider, ChatRequest, ProviderError};

/// A provider that replays queued completions, or echoes the last user
/// message when the queue is empty. Token usage is derived from lengths so
/// deductions stay deterministic.
#[derive(Default)]
pub struct StaticProvider {
    queued: Mutex<VecDeque<Result<ChatCompletion, ProviderError>>>,
}

impl StaticProvider {
    /// An empty provider in echo mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a canned reply for the next call.
    pub fn push_reply(&self, content: impl Into<String>, thinking: Option<String>) {
        let content = content.into();
        let completion = ChatCompletion {
            input_tokens: 50,
            output_tokens: (content.len() as u64 / 4).max(1),
            content,
            thinking,
            model: "static-1".into(),
        };
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(Ok(completion));
        }
    }

    /// Queue a failure for the next call.
    pub fn push_error(&self, error: ProviderError) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(Err(error));
        }
    }
}

#[async_trait]
impl ChatProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn default_model(&self) -> &str {
        "static-1"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        if let Ok(mut queued) = self.queued.lock() {
            if let Some(next) = queued.pop_front() {
                return next;
            }
        }

        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(ChatCompletion {
            input_tokens: (last_user.len() as u64 / 4).max(1),
            output_tokens: 8,
            content: format!("Echo: {last_user}"),
            thinking: None,
            model: "static-1".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_replies_come_back_in_order() {
        let provider = StaticProvider::new();
        provider.push_reply("first", None);
        provider.push_reply("second", Some("because".into()));

        let a = provider.chat(ChatRequest::single(None, "x")).await.unwrap();
        let b = provider.chat(ChatRequest::single(None, "x")).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(b.thinking.as_deref(), Some("because"));

        // Queue drained: falls back to echo.
        let c = provider.chat(ChatRequest::single(None, "ping")).await.unwrap();
        assert_eq!(c.content, "Echo: ping");
    }

    #[tokio::test]
    async fn queued_error_is_returned() {
        let provider = StaticProvider::new();
        provider.push_error(ProviderError::Http("connection refused".into()));

        let err = provider
            .chat(ChatRequest::single(None, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }
}
