//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{chat, companies, credits, games, gdevelop, health, providers, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for AI-invoking endpoints. Each one holds a
/// provider connection for the duration of the call.
const AI_MAX_CONCURRENT_REQUESTS: usize = 25;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /games/shared/{token}` - Resolve a share link
///
/// ## Companies and credits (JWT auth)
/// - `POST /api/companies`, `GET /api/companies/me`
/// - `GET /api/credits/balance|transactions|analytics`
/// - `POST /api/credits/add` (admin key)
///
/// ## AI (JWT auth, credit gated)
/// - `POST /api/assist`, `POST /api/chat`, `GET /api/providers`
/// - `POST /api/gdevelop/chat`, session get/delete, preview, export
///
/// ## Publishing (JWT auth)
/// - `POST /api/games`, domain and share lifecycles
///
/// ## Webhooks (HMAC signature)
/// - `POST /webhooks/payments`
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    // AI endpoints get their own, tighter concurrency limit.
    let ai_routes = Router::new()
        .route("/assist", post(chat::assist))
        .route("/chat", post(chat::chat))
        .route("/gdevelop/chat", post(gdevelop::chat))
        .route("/gdevelop/sessions", get(gdevelop::list_sessions))
        .route(
            "/gdevelop/session/:id",
            get(gdevelop::get_session).delete(gdevelop::delete_session),
        )
        .route("/gdevelop/preview/:id", get(gdevelop::preview))
        .route("/gdevelop/export/:id", post(gdevelop::export))
        .layer(ConcurrencyLimitLayer::new(AI_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Companies
        .route("/companies", post(companies::create_company))
        .route("/companies/me", get(companies::get_my_company))
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/credits/analytics", get(credits::get_analytics))
        .route("/credits/add", post(credits::admin_add_credits))
        // Providers
        .route("/providers", get(providers::list_providers))
        // Publishing
        .route("/games", post(games::create_game).get(games::list_games))
        .route(
            "/games/:id/domain",
            post(games::attach_domain)
                .get(games::domain_status)
                .delete(games::remove_domain),
        )
        .route(
            "/games/:id/share",
            post(games::create_share)
                .put(games::update_share)
                .delete(games::delete_share),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .merge(ai_routes);

    Router::new()
        .route("/health", get(health::health))
        // Public share links resolve outside /api: no JWT required.
        .route("/games/shared/:token", get(games::get_shared_game))
        .nest("/api", api_routes)
        // Webhooks stay outside /api: no JWT, signature-verified instead.
        .route("/webhooks/payments", post(webhooks::payments_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
