//! GDevelop session endpoints: chat turns, previews, exports.
//!
//! All endpoints are gated behind `gdevelop.enabled`. Sessions are owned by
//! the user who created them; access by anyone else is indistinguishable
//! from a missing session.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use pilot_core::{estimate_tokens, GameSession, SessionId, WorkspaceId};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::gdevelop::cli::CliError;
use crate::gdevelop::{BuildService, ChatTurnOptions, ErrorCategory, GameService};
use crate::handlers::companies::require_company;
use crate::state::AppState;

fn default_preserve() -> bool {
    true
}

/// GDevelop chat request body.
#[derive(Debug, Deserialize)]
pub struct GDevelopChatRequest {
    /// Existing session to modify; absent to start a new game.
    pub session_id: Option<SessionId>,
    /// Workspace for a new session. Required when `session_id` is absent.
    pub workspace_id: Option<WorkspaceId>,
    /// The user's message.
    pub message: String,
    /// Provider name; the configured default applies when absent.
    pub provider: Option<String>,
    /// Model override.
    pub model: Option<String>,
    /// Carry over objects and layouts the AI reply dropped.
    #[serde(default = "default_preserve")]
    pub preserve_existing: bool,
}

/// `POST /api/gdevelop/chat`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<GDevelopChatRequest>,
) -> Result<Response, ApiError> {
    ensure_enabled(&state)?;
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let company = require_company(&state, &auth)?;
    let estimated = estimate_tokens(&req.message, 0);
    if !company.can_afford(estimated) {
        return Err(ApiError::InsufficientCredits {
            credits_available: company.credits,
            estimated_tokens: estimated,
        });
    }

    let options = ChatTurnOptions {
        provider: req.provider.clone(),
        model: req.model.clone(),
        preserve_existing: req.preserve_existing,
    };
    let service = GameService::new(Arc::clone(&state.store), Arc::clone(&state.providers));

    let (session_id, outcome) = match req.session_id {
        Some(session_id) => {
            let session = owned_session(&state, &auth, &session_id)?;
            (session_id, service.modify_game(&session, &req.message, &options).await)
        }
        None => {
            let workspace_id = req.workspace_id.ok_or_else(|| {
                ApiError::BadRequest("workspace_id is required for a new session".into())
            })?;
            let session_id = SessionId::generate();
            (
                session_id,
                service
                    .create_game(session_id, workspace_id, auth.user_id, &req.message, &options)
                    .await,
            )
        }
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => return Ok(turn_failure(&state, session_id, err)),
    };
    state.recovery.clear_session(session_id);

    let provider_name = req
        .provider
        .or_else(|| state.providers.default_name().map(ToOwned::to_owned))
        .unwrap_or_else(|| "unknown".to_owned());
    let transaction = state.credits().deduct_ai_usage(
        &company.id,
        auth.user_id,
        &provider_name,
        &outcome.completion.model,
        outcome.completion.input_tokens,
        outcome.completion.output_tokens,
    )?;

    info!(
        %session_id,
        version = outcome.session.version,
        game_changed = outcome.game_changed,
        credits = transaction.amount,
        "GDevelop chat turn completed"
    );

    Ok(Json(json!({
        "session_id": outcome.session.session_id,
        "version": outcome.session.version,
        "game_title": outcome.session.title(),
        "game_json": outcome.session.game_json,
        "response": outcome.completion.content,
        "thinking": outcome.completion.thinking,
        "game_changed": outcome.game_changed,
        "usage": {
            "input_tokens": outcome.completion.input_tokens,
            "output_tokens": outcome.completion.output_tokens,
            "total_tokens": outcome.completion.total_tokens(),
        },
        "credits": {
            "deducted": transaction.amount,
            "remaining": transaction.balance_after,
        },
    }))
    .into_response())
}

/// Query for the session listing.
#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    /// Workspace to list sessions for.
    pub workspace_id: WorkspaceId,
}

/// `GET /api/gdevelop/sessions`
///
/// Lists the caller's sessions in a workspace as lightweight summaries.
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Value>, ApiError> {
    let sessions = state.store.list_sessions_by_workspace(&query.workspace_id)?;
    let summaries: Vec<Value> = sessions
        .iter()
        .filter(|s| s.user_id == auth.user_id)
        .map(|s| {
            json!({
                "session_id": s.session_id,
                "game_title": s.title(),
                "version": s.version,
                "status": s.status,
                "preview_url": s.preview_url,
                "last_modified": s.last_modified,
            })
        })
        .collect();

    Ok(Json(json!({ "sessions": summaries })))
}

/// `GET /api/gdevelop/session/{id}`
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(session_id): Path<SessionId>,
) -> Result<Json<GameSession>, ApiError> {
    let session = owned_session(&state, &auth, &session_id)?;
    Ok(Json(session))
}

/// `DELETE /api/gdevelop/session/{id}`
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Value>, ApiError> {
    owned_session(&state, &auth, &session_id)?;
    state.store.delete_session(&session_id)?;
    state.recovery.clear_session(session_id);

    info!(%session_id, "Session deleted");
    Ok(Json(json!({ "deleted": true })))
}

/// `GET /api/gdevelop/preview/{id}`
pub async fn preview(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(session_id): Path<SessionId>,
) -> Result<Response, ApiError> {
    ensure_enabled(&state)?;
    let mut session = owned_session(&state, &auth, &session_id)?;

    let builds = BuildService::new(state.config.gdevelop.clone());
    let url = match builds.preview(&session).await {
        Ok(url) => url,
        Err(err) => {
            session.mark_error(err.user_friendly_message());
            state.store.put_session(&session)?;
            return Ok(build_failure(&state, session_id, &err));
        }
    };

    session.error_log = None;
    session.preview_url = Some(url.clone());
    state.store.put_session(&session)?;
    state.recovery.clear_session(session_id);

    Ok(Json(json!({ "preview_url": url })).into_response())
}

/// `POST /api/gdevelop/export/{id}`
pub async fn export(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(session_id): Path<SessionId>,
) -> Result<Response, ApiError> {
    ensure_enabled(&state)?;
    let mut session = owned_session(&state, &auth, &session_id)?;

    let builds = BuildService::new(state.config.gdevelop.clone());
    let url = match builds.export(&session).await {
        Ok(url) => url,
        Err(err) => {
            session.mark_error(err.user_friendly_message());
            state.store.put_session(&session)?;
            return Ok(build_failure(&state, session_id, &err));
        }
    };

    session.error_log = None;
    session.export_url = Some(url.clone());
    state.store.put_session(&session)?;
    state.recovery.clear_session(session_id);

    Ok(Json(json!({ "download_url": url })).into_response())
}

fn ensure_enabled(state: &AppState) -> Result<(), ApiError> {
    if state.config.gdevelop.enabled {
        Ok(())
    } else {
        Err(ApiError::EngineDisabled)
    }
}

/// Load a session the caller owns. A session owned by someone else reads the
/// same as a missing one.
fn owned_session(
    state: &AppState,
    auth: &AuthUser,
    session_id: &SessionId,
) -> Result<GameSession, ApiError> {
    let not_found = || ApiError::NotFound(format!("session not found: {session_id}"));
    let session = state.store.get_session(session_id)?.ok_or_else(not_found)?;
    if session.user_id != auth.user_id {
        return Err(not_found());
    }
    Ok(session)
}

/// Record a failed turn and render the error, attaching simplification
/// suggestions once the session keeps failing the same way.
fn turn_failure(state: &AppState, session_id: SessionId, err: ApiError) -> Response {
    let category = match &err {
        ApiError::Validation(_) => ErrorCategory::Validation,
        ApiError::Provider(_) => ErrorCategory::Provider,
        _ => return err.into_response(),
    };

    let failures = state.recovery.record_failure(session_id, category);
    let mut response = err.into_response();
    if state.recovery.should_suggest_fallback(session_id, category) {
        response = with_suggestions(response.status(), category, failures);
    }
    response
}

/// Record a failed build and render the CLI error the same way `ApiError`
/// would, with suggestions once the threshold is reached.
fn build_failure(state: &AppState, session_id: SessionId, err: &CliError) -> Response {
    error!(%session_id, error = %err, debug = %err.debug_info(), "Build failed");
    let failures = state.recovery.record_failure(session_id, ErrorCategory::Build);

    if state.recovery.should_suggest_fallback(session_id, ErrorCategory::Build) {
        return with_suggestions(StatusCode::UNPROCESSABLE_ENTITY, ErrorCategory::Build, failures);
    }

    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "error": {
                "code": "cli_error",
                "message": err.user_friendly_message(),
                "details": { "is_retryable": err.is_retryable() },
            }
        })),
    )
        .into_response()
}

fn with_suggestions(status: StatusCode, category: ErrorCategory, failures: u32) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": "repeated_failures",
                "message": "This request keeps failing. Try one of the suggestions.",
                "details": {
                    "category": category,
                    "failure_count": failures,
                    "suggestions": category.suggestions(),
                },
            }
        })),
    )
        .into_response()
}
