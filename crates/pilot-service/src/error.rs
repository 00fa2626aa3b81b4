//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pilot_core::ValidationIssue;
use serde::Serialize;

use crate::gdevelop::cli::CliError;
use crate::providers::ProviderError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient permissions.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The session changed since the client read it.
    #[error("version conflict: expected version {expected}, session is at {actual}")]
    VersionConflict {
        /// Version the client based its request on.
        expected: i64,
        /// Version currently stored.
        actual: i64,
    },

    /// Insufficient credits for the request.
    #[error("insufficient credits: available={credits_available}, estimated={estimated_tokens}")]
    InsufficientCredits {
        /// Current balance.
        credits_available: i64,
        /// Estimated cost of the rejected request.
        estimated_tokens: i64,
    },

    /// Game document failed validation.
    #[error("game validation failed ({} issues)", .0.len())]
    Validation(Vec<ValidationIssue>),

    /// GDevelop endpoints are disabled by configuration.
    #[error("GDevelop engine is disabled")]
    EngineDisabled,

    /// AI provider call failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// GDevelop CLI failure.
    #[error("{}", .0.user_friendly_message())]
    Cli(CliError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::VersionConflict { expected, actual } => (
                StatusCode::CONFLICT,
                "version_conflict",
                self.to_string(),
                Some(serde_json::json!({
                    "expected_version": expected,
                    "current_version": actual
                })),
            ),
            // The credit guard keeps the flat shape clients already parse.
            Self::InsufficientCredits {
                credits_available,
                estimated_tokens,
            } => {
                let body = serde_json::json!({
                    "error": "insufficient_credits",
                    "credits_available": credits_available,
                    "estimated_tokens": estimated_tokens,
                });
                return (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response();
            }
            Self::Validation(issues) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_failed",
                "game document failed validation".to_string(),
                Some(serde_json::json!({ "issues": issues })),
            ),
            Self::EngineDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "gdevelop_disabled",
                self.to_string(),
                None,
            ),
            Self::Provider(msg) => {
                tracing::error!(error = %msg, "AI provider call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "provider_error",
                    "The AI provider request failed".to_string(),
                    None,
                )
            }
            Self::Cli(err) => {
                // Full detail stays in the logs; the client gets a sanitized
                // message and whether a retry can help.
                tracing::error!(error = %err, debug = %err.debug_info(), "GDevelop CLI failure");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "cli_error",
                    err.user_friendly_message(),
                    Some(serde_json::json!({ "is_retryable": err.is_retryable() })),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<pilot_store::StoreError> for ApiError {
    fn from(err: pilot_store::StoreError) -> Self {
        match err {
            pilot_store::StoreError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            pilot_store::StoreError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits {
                    credits_available: balance,
                    estimated_tokens: required,
                }
            }
            pilot_store::StoreError::VersionConflict { expected, actual } => {
                Self::VersionConflict { expected, actual }
            }
            pilot_store::StoreError::SessionNotActive { status } => {
                Self::Conflict(format!("session is not active: {status}"))
            }
            pilot_store::StoreError::DuplicatePayment { payment_id } => {
                Self::Conflict(format!("payment already processed: {payment_id}"))
            }
            pilot_store::StoreError::DomainTaken { domain } => {
                Self::Conflict(format!("domain already in use: {domain}"))
            }
            pilot_store::StoreError::Database(msg)
            | pilot_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<CliError> for ApiError {
    fn from(err: CliError) -> Self {
        Self::Cli(err)
    }
}

impl From<pilot_core::DomainError> for ApiError {
    fn from(err: pilot_core::DomainError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
