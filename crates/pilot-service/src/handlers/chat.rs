//! Credit-gated AI chat.
//!
//! Both endpoints estimate the cost up front and reject with 402 before any
//! provider call. `/api/chat` deducts the provider's actual token usage after
//! the call; a provider failure deducts nothing.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use pilot_core::{estimate_tokens, Company};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::companies::require_company;
use crate::providers::{ChatCompletion, ChatRequest};
use crate::state::AppState;

/// Characters per SSE chunk when streaming a reply.
const STREAM_CHUNK_CHARS: usize = 80;

/// Chat request body.
#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    /// The user's message.
    pub message: String,
    /// Provider name; the configured default applies when absent.
    pub provider: Option<String>,
    /// Model override.
    pub model: Option<String>,
    /// Additional context sent along with the message (editor state, docs).
    pub context: Option<String>,
    /// Relay the reply as `text/event-stream`.
    #[serde(default)]
    pub stream: bool,
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<ChatRequestBody>,
) -> Result<Response, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let company = require_company(&state, &auth)?;
    let estimated = guard_estimate(&company, &req.message, req.context.as_deref())?;
    debug!(company_id = %company.id, estimated, "Chat request accepted by credit gate");

    let provider = state.providers.get(req.provider.as_deref()).ok_or_else(|| {
        ApiError::BadRequest(match &req.provider {
            Some(name) => format!("provider not configured: {name}"),
            None => "no AI provider configured".to_string(),
        })
    })?;
    let provider_name = provider.name().to_owned();

    let completion = provider
        .chat(ChatRequest {
            model: req.model.clone(),
            system: req.context.clone(),
            messages: vec![crate::providers::ChatMessage::user(req.message.clone())],
            max_tokens: crate::providers::DEFAULT_MAX_TOKENS,
        })
        .await?;

    let transaction = state.credits().deduct_ai_usage(
        &company.id,
        auth.user_id,
        &provider_name,
        &completion.model,
        completion.input_tokens,
        completion.output_tokens,
    )?;

    if req.stream {
        return Ok(stream_completion(completion, transaction.amount));
    }

    Ok(Json(json!({
        "response": completion.content,
        "thinking": completion.thinking,
        "provider": provider_name,
        "model": completion.model,
        "usage": {
            "input_tokens": completion.input_tokens,
            "output_tokens": completion.output_tokens,
            "total_tokens": completion.total_tokens(),
        },
        "credits": {
            "deducted": transaction.amount,
            "remaining": transaction.balance_after,
        },
    }))
    .into_response())
}

/// Assist request body.
#[derive(Debug, Deserialize)]
pub struct AssistRequestBody {
    /// The user's message.
    pub message: String,
    /// Provider name; the configured default applies when absent.
    pub provider: Option<String>,
    /// Additional context bytes counted toward the estimate.
    pub context: Option<String>,
}

/// `POST /api/assist`
///
/// Resolves the provider and runs the credit gate without calling the AI.
/// Engine plugins use this to pick a provider before opening a stream.
pub async fn assist(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<AssistRequestBody>,
) -> Result<Json<Value>, ApiError> {
    let company = require_company(&state, &auth)?;
    let estimated = guard_estimate(&company, &req.message, req.context.as_deref())?;

    let provider = state.providers.get(req.provider.as_deref()).ok_or_else(|| {
        ApiError::BadRequest(match &req.provider {
            Some(name) => format!("provider not configured: {name}"),
            None => "no AI provider configured".to_string(),
        })
    })?;

    Ok(Json(json!({
        "provider": provider.name(),
        "model": provider.default_model(),
        "estimated_tokens": estimated,
        "credits_available": company.credits,
    })))
}

/// Run the 402 gate and return the estimate it was based on.
fn guard_estimate(
    company: &Company,
    message: &str,
    context: Option<&str>,
) -> Result<i64, ApiError> {
    let estimated = estimate_tokens(message, context.map_or(0, str::len));
    if company.can_afford(estimated) {
        Ok(estimated)
    } else {
        Err(ApiError::InsufficientCredits {
            credits_available: company.credits,
            estimated_tokens: estimated,
        })
    }
}

/// Relay an already-completed reply as SSE chunks, ending with a `done`
/// event carrying usage and the deducted amount.
fn stream_completion(completion: ChatCompletion, deducted: i64) -> Response {
    let done = json!({
        "model": completion.model,
        "usage": {
            "input_tokens": completion.input_tokens,
            "output_tokens": completion.output_tokens,
            "total_tokens": completion.total_tokens(),
        },
        "credits_deducted": deducted,
    });

    let chars: Vec<char> = completion.content.chars().collect();
    let mut events: Vec<Result<Event, Infallible>> = chars
        .chunks(STREAM_CHUNK_CHARS)
        .map(|chunk| {
            Ok(Event::default()
                .event("message")
                .data(chunk.iter().collect::<String>()))
        })
        .collect();
    events.push(Ok(Event::default().event("done").data(done.to_string())));

    Sse::new(stream::iter(events))
        .keep_alive(KeepAlive::default())
        .into_response()
}
