//! Pilot HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use pilot_core::{GameSession, SessionId};

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, AssistRequest, AssistResponse, BalanceResponse, ChatRequest, ChatResponse,
    ExportResponse, GameChatRequest, GameChatResponse, PreviewResponse,
};

/// Pilot API client.
///
/// Authenticates every request with the user's bearer token; engine plugins
/// obtain the token from the desktop login flow.
#[derive(Debug, Clone)]
pub struct PilotClient {
    client: Client,
    base_url: String,
    auth_token: String,
}

impl PilotClient {
    /// Create a new pilot client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the pilot service (e.g., `"https://api.surrealpilot.com"`)
    /// * `auth_token` - The user's bearer token
    #[must_use]
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self::with_options(base_url, auth_token, ClientOptions::default())
    }

    /// Create a new pilot client with custom options.
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: auth_token.into(),
        }
    }

    /// Get the company's credit balance summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_balance(&self) -> Result<BalanceResponse, ClientError> {
        let url = format!("{}/api/credits/balance", self.base_url);
        let response = self.client.get(&url).bearer_auth(&self.auth_token).send().await?;
        Self::handle_response(response).await
    }

    /// Run the credit gate and resolve the provider without calling the AI.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientCredits` when the balance does not
    /// cover the estimate.
    pub async fn assist(&self, request: AssistRequest) -> Result<AssistResponse, ClientError> {
        let url = format!("{}/api/assist", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(&request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Send a chat message and get the reply with usage and credits.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientCredits` when gated, or an API
    /// error for provider failures.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ClientError> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(&request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Run one GDevelop chat turn: create a session or modify an existing
    /// one.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::VersionConflict` when the session changed since
    /// this client last read it, and `ClientError::Validation` when the
    /// generated document was rejected.
    pub async fn game_chat(
        &self,
        request: GameChatRequest,
    ) -> Result<GameChatResponse, ClientError> {
        let url = format!("{}/api/gdevelop/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(&request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Fetch a session's full state.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the session is missing.
    pub async fn get_session(&self, session_id: SessionId) -> Result<GameSession, ClientError> {
        let url = format!("{}/api/gdevelop/session/{session_id}", self.base_url);
        let response = self.client.get(&url).bearer_auth(&self.auth_token).send().await?;
        Self::handle_response(response).await
    }

    /// Delete a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the session is missing.
    pub async fn delete_session(&self, session_id: SessionId) -> Result<(), ClientError> {
        let url = format!("{}/api/gdevelop/session/{session_id}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        Self::handle_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    /// Build an HTML5 preview of the session's game.
    ///
    /// # Errors
    ///
    /// Returns an API error with code `cli_error` when the build fails; the
    /// `is_retryable` detail says whether retrying can help.
    pub async fn preview(&self, session_id: SessionId) -> Result<PreviewResponse, ClientError> {
        let url = format!("{}/api/gdevelop/preview/{session_id}", self.base_url);
        let response = self.client.get(&url).bearer_auth(&self.auth_token).send().await?;
        Self::handle_response(response).await
    }

    /// Build a downloadable archive of the session's game.
    ///
    /// # Errors
    ///
    /// Returns an API error with code `cli_error` when the build fails.
    pub async fn export(&self, session_id: SessionId) -> Result<ExportResponse, ClientError> {
        let url = format!("{}/api/gdevelop/export/{session_id}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();

        // The 402 gate uses a flat body rather than the structured shape.
        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            return Err(ClientError::InsufficientCredits {
                credits_available: body
                    .get("credits_available")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(0),
                estimated_tokens: body
                    .get("estimated_tokens")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(0),
            });
        }

        let Ok(api_error) = serde_json::from_value::<ApiErrorResponse>(body) else {
            return Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            });
        };

        match api_error.error.code.as_str() {
            "version_conflict" => {
                let details = api_error.error.details.unwrap_or_default();
                Err(ClientError::VersionConflict {
                    expected: details
                        .get("expected_version")
                        .and_then(serde_json::Value::as_i64)
                        .unwrap_or(0),
                    actual: details
                        .get("current_version")
                        .and_then(serde_json::Value::as_i64)
                        .unwrap_or(0),
                })
            }
            "validation_failed" => {
                let issues = api_error
                    .error
                    .details
                    .as_ref()
                    .and_then(|d| d.get("issues"))
                    .and_then(serde_json::Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                Err(ClientError::Validation {
                    message: api_error.error.message,
                    issues,
                })
            }
            code => Err(ClientError::Api {
                code: code.to_string(),
                message: api_error.error.message,
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 120; AI calls are slow).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = PilotClient::new("http://localhost:8080/", "token");
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
