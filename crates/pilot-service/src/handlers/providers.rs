//! Configured provider listing.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/providers`
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let default = state.providers.default_name();

    let providers: Vec<Value> = state
        .providers
        .names()
        .into_iter()
        .filter_map(|name| {
            let provider = state.providers.get(Some(name.as_str()))?;
            Some(json!({
                "name": name,
                "default_model": provider.default_model(),
                "is_default": Some(name.as_str()) == default,
            }))
        })
        .collect();

    Ok(Json(json!({
        "providers": providers,
        "default": default,
    })))
}
