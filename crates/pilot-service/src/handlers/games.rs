//! Game publishing: registration, custom domains, share links.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use pilot_core::{normalize_domain, DomainStatus, GameId, GameRecord, SessionId, WorkspaceId};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::companies::require_company;
use crate::state::AppState;

/// Request to register a publishable game.
#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    /// Workspace the game lives in.
    pub workspace_id: WorkspaceId,
    /// Session the build comes from, when published from the editor.
    pub session_id: Option<SessionId>,
    /// Display title.
    pub title: String,
}

/// `POST /api/games`
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameRecord>), ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }

    let company = require_company(&state, &auth)?;
    let mut game = GameRecord::new(company.id, req.workspace_id, title.to_owned());
    game.session_id = req.session_id;
    state.store.put_game(&game)?;

    info!(game_id = %game.id, company_id = %company.id, "Game registered");
    Ok((StatusCode::CREATED, Json(game)))
}

/// `GET /api/games`
pub async fn list_games(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let company = require_company(&state, &auth)?;
    let games = state.store.list_games_by_company(&company.id)?;
    Ok(Json(json!({ "games": games })))
}

/// Request to attach a custom domain.
#[derive(Debug, Deserialize)]
pub struct AttachDomainRequest {
    /// Domain as the user typed it; normalized before storage.
    pub domain: String,
}

/// `POST /api/games/{id}/domain`
pub async fn attach_domain(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(game_id): Path<GameId>,
    Json(req): Json<AttachDomainRequest>,
) -> Result<Json<Value>, ApiError> {
    owned_game(&state, &auth, &game_id)?;

    let domain = normalize_domain(&req.domain)?;
    let game = state.store.attach_domain(&game_id, &domain)?;

    info!(%game_id, %domain, "Custom domain attached");
    Ok(Json(json!({
        "domain": domain,
        "status": game.domain_status,
        "dns_instructions": dns_instructions(&state, &domain),
    })))
}

/// `GET /api/games/{id}/domain`
///
/// Reports the domain status, verifying DNS when the domain is still
/// pending: the domain must resolve to this server's IP.
pub async fn domain_status(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(game_id): Path<GameId>,
) -> Result<Json<Value>, ApiError> {
    let mut game = owned_game(&state, &auth, &game_id)?;

    let Some(domain) = game.custom_domain.clone() else {
        return Ok(Json(json!({ "domain": null, "status": DomainStatus::None })));
    };

    if game.domain_status == DomainStatus::Pending {
        if let Some(server_ip) = &state.config.server_ip {
            match verify_dns(&domain, server_ip).await {
                Some(true) => {
                    game.domain_status = DomainStatus::Active;
                    state.store.put_game(&game)?;
                    info!(%game_id, %domain, "Custom domain verified");
                }
                Some(false) => {
                    debug!(%game_id, %domain, "Domain resolves elsewhere");
                }
                None => {
                    debug!(%game_id, %domain, "Domain does not resolve yet");
                }
            }
        }
    }

    Ok(Json(json!({
        "domain": domain,
        "status": game.domain_status,
        "dns_instructions": dns_instructions(&state, &domain),
    })))
}

/// `DELETE /api/games/{id}/domain`
pub async fn remove_domain(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(game_id): Path<GameId>,
) -> Result<Json<Value>, ApiError> {
    let mut game = owned_game(&state, &auth, &game_id)?;
    game.clear_custom_domain();
    state.store.put_game(&game)?;

    info!(%game_id, "Custom domain removed");
    Ok(Json(json!({ "removed": true })))
}

/// Share settings overrides. Absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct ShareSettingsPatch {
    /// Allow embedding in third-party pages.
    pub allow_embedding: Option<bool>,
    /// Show the author's workspace name on the share page.
    pub show_author: Option<bool>,
}

/// `POST /api/games/{id}/share`
///
/// Enables sharing, minting a token when the game has none yet.
pub async fn create_share(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(game_id): Path<GameId>,
    Json(patch): Json<ShareSettingsPatch>,
) -> Result<Json<Value>, ApiError> {
    let mut game = owned_game(&state, &auth, &game_id)?;

    if game.share_token.is_none() {
        game.share_token = Some(uuid::Uuid::new_v4().simple().to_string());
    }
    game.share_settings.public = true;
    apply_share_patch(&mut game, &patch);
    state.store.put_game(&game)?;

    info!(%game_id, "Share link enabled");
    Ok(Json(share_body(&game)))
}

/// `PUT /api/games/{id}/share`
pub async fn update_share(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(game_id): Path<GameId>,
    Json(patch): Json<ShareSettingsPatch>,
) -> Result<Json<Value>, ApiError> {
    let mut game = owned_game(&state, &auth, &game_id)?;
    if game.share_token.is_none() {
        return Err(ApiError::NotFound("game has no share link".into()));
    }

    apply_share_patch(&mut game, &patch);
    state.store.put_game(&game)?;
    Ok(Json(share_body(&game)))
}

/// `DELETE /api/games/{id}/share`
pub async fn delete_share(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(game_id): Path<GameId>,
) -> Result<Json<Value>, ApiError> {
    let mut game = owned_game(&state, &auth, &game_id)?;
    game.share_token = None;
    game.share_settings.public = false;
    state.store.put_game(&game)?;

    info!(%game_id, "Share link revoked");
    Ok(Json(json!({ "revoked": true })))
}

/// `GET /games/shared/{token}`
///
/// Public: resolves a share token to the playable game. Counts the view.
pub async fn get_shared_game(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let not_found = || ApiError::NotFound("shared game not found".into());
    let game = state
        .store
        .get_game_by_share_token(&token)?
        .ok_or_else(not_found)?;
    if !game.share_settings.public {
        return Err(not_found());
    }

    let game = state.store.increment_play_count(&game.id)?;

    Ok(Json(json!({
        "title": game.title,
        "build_url": game.build_url,
        "play_count": game.play_count,
        "allow_embedding": game.share_settings.allow_embedding,
        "workspace_id": game.share_settings.show_author.then_some(game.workspace_id),
    })))
}

/// Load a game the caller's company owns. Someone else's game reads the same
/// as a missing one.
fn owned_game(state: &AppState, auth: &AuthUser, game_id: &GameId) -> Result<GameRecord, ApiError> {
    let not_found = || ApiError::NotFound(format!("game not found: {game_id}"));
    let company = require_company(state, auth)?;
    let game = state.store.get_game(game_id)?.ok_or_else(not_found)?;
    if game.company_id != company.id {
        return Err(not_found());
    }
    Ok(game)
}

fn apply_share_patch(game: &mut GameRecord, patch: &ShareSettingsPatch) {
    if let Some(allow_embedding) = patch.allow_embedding {
        game.share_settings.allow_embedding = allow_embedding;
    }
    if let Some(show_author) = patch.show_author {
        game.share_settings.show_author = show_author;
    }
}

fn share_body(game: &GameRecord) -> Value {
    json!({
        "share_token": game.share_token,
        "share_url": game
            .share_token
            .as_ref()
            .map(|token| format!("/games/shared/{token}")),
        "settings": game.share_settings,
    })
}

fn dns_instructions(state: &AppState, domain: &str) -> Value {
    json!({
        "record_type": "A",
        "host": domain,
        "value": state.config.server_ip,
    })
}

/// Whether the domain resolves to the given IP. `None` when it does not
/// resolve at all.
async fn verify_dns(domain: &str, server_ip: &str) -> Option<bool> {
    let addrs = tokio::net::lookup_host((domain, 80)).await.ok()?;
    let mut resolved_any = false;
    for addr in addrs {
        resolved_any = true;
        if addr.ip().to_string() == server_ip {
            return Some(true);
        }
    }
    resolved_any.then_some(false)
}
