//! Request and response types for the pilot API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pilot_core::{SessionId, WorkspaceId};

/// Structured error body returned by the service.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    /// The error payload.
    pub error: ApiErrorBody,
}

/// Error payload within an error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Code-specific details.
    pub details: Option<Value>,
}

/// Credit balance summary.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Current balance.
    pub credits: i64,
    /// Plan slug.
    pub plan: String,
    /// Effective monthly cap.
    pub monthly_limit: i64,
    /// Credits consumed this calendar month.
    pub current_month_usage: i64,
    /// Credits left under the monthly cap.
    pub remaining_monthly_allowance: i64,
    /// Whether usage is at 90% of the cap or beyond.
    pub is_approaching_limit: bool,
}

/// Token usage reported with a completed AI call.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
    /// Sum of both.
    pub total_tokens: u64,
}

/// Credits moved by a completed AI call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditsCharged {
    /// Credits deducted for this call.
    pub deducted: i64,
    /// Balance after the deduction.
    pub remaining: i64,
}

/// Request for `POST /api/assist`.
#[derive(Debug, Clone, Serialize)]
pub struct AssistRequest {
    /// The user's message.
    pub message: String,
    /// Provider name; the server default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Context counted toward the cost estimate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Response from `POST /api/assist`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistResponse {
    /// Provider that will answer.
    pub provider: String,
    /// Model that will answer.
    pub model: String,
    /// Estimated cost of the full request.
    pub estimated_tokens: i64,
    /// Balance at the time of the check.
    pub credits_available: i64,
}

/// Request for `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// Provider name; the server default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Context sent along with the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Response from `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Assistant reply.
    pub response: String,
    /// Reasoning narrative, when the provider returned one.
    pub thinking: Option<String>,
    /// Provider that answered.
    pub provider: String,
    /// Model that answered.
    pub model: String,
    /// Actual token usage.
    pub usage: Usage,
    /// Credits moved.
    pub credits: CreditsCharged,
}

/// Request for `POST /api/gdevelop/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct GameChatRequest {
    /// Existing session to modify; absent to start a new game.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Workspace for a new session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    /// The user's message.
    pub message: String,
    /// Provider name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Response from `POST /api/gdevelop/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct GameChatResponse {
    /// The session the turn applied to.
    pub session_id: SessionId,
    /// Document version after the turn.
    pub version: i64,
    /// Display title.
    pub game_title: String,
    /// The full current game document.
    pub game_json: Value,
    /// Assistant reply.
    pub response: String,
    /// Whether the turn changed the game document.
    pub game_changed: bool,
    /// Actual token usage.
    pub usage: Usage,
    /// Credits moved.
    pub credits: CreditsCharged,
}

/// Response from `GET /api/gdevelop/preview/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewResponse {
    /// URL of the built HTML5 bundle.
    pub preview_url: String,
}

/// Response from `POST /api/gdevelop/export/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportResponse {
    /// URL of the downloadable archive.
    pub download_url: String,
}
