//! Company registration and lookup.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use pilot_core::Company;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Request to create a company.
#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    /// Display name.
    pub name: String,
}

/// `POST /api/companies`
///
/// Creates the caller's company on the starter plan with welcome credits.
/// A user owns at most one company.
pub async fn create_company(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("company name must not be empty".into()));
    }

    if !state
        .store
        .list_companies_by_owner(&auth.user_id)?
        .is_empty()
    {
        return Err(ApiError::Conflict("user already owns a company".into()));
    }

    let company = Company::new(name.to_owned(), auth.user_id);
    state.store.put_company(&company)?;

    info!(company_id = %company.id, user_id = %auth.user_id, "Company created");
    Ok((StatusCode::CREATED, Json(company)))
}

/// `GET /api/companies/me`
pub async fn get_my_company(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Company>, ApiError> {
    let company = require_company(&state, &auth)?;
    Ok(Json(company))
}

/// The caller's company, or 404 when they have not registered one.
pub(crate) fn require_company(state: &AppState, auth: &AuthUser) -> Result<Company, ApiError> {
    state
        .store
        .list_companies_by_owner(&auth.user_id)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("no company registered for this user".into()))
}
