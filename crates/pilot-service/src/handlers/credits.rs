//! Credit balance, ledger, analytics, and admin grants.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use pilot_core::CompanyId;

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::handlers::companies::require_company;
use crate::state::AppState;

/// Default analytics window when `from` is not given.
const DEFAULT_ANALYTICS_DAYS: i64 = 30;

/// `GET /api/credits/balance`
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let company = require_company(&state, &auth)?;
    let summary = state.credits().balance_summary(&company.id)?;
    Ok(Json(serde_json::to_value(summary).map_err(|e| {
        ApiError::Internal(e.to_string())
    })?))
}

/// Pagination for the transaction listing.
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    /// Page size (default 20, max 100).
    pub limit: Option<usize>,
    /// Entries to skip.
    pub offset: Option<usize>,
}

/// `GET /api/credits/transactions`
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Value>, ApiError> {
    let company = require_company(&state, &auth)?;
    let limit = query.limit.unwrap_or(20);
    let offset = query.offset.unwrap_or(0);

    let transactions = state
        .credits()
        .recent_transactions(&company.id, limit, offset)?;

    Ok(Json(json!({
        "transactions": transactions,
        "limit": limit,
        "offset": offset,
    })))
}

/// Time window for analytics.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Window start (RFC 3339). Defaults to 30 days ago.
    pub from: Option<DateTime<Utc>>,
    /// Window end (RFC 3339). Defaults to now.
    pub to: Option<DateTime<Utc>>,
}

/// `GET /api/credits/analytics`
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Value>, ApiError> {
    let company = require_company(&state, &auth)?;
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query
        .from
        .unwrap_or_else(|| to - Duration::days(DEFAULT_ANALYTICS_DAYS));
    if from >= to {
        return Err(ApiError::BadRequest("`from` must be before `to`".into()));
    }

    let analytics = state.credits().usage_analytics(&company.id, from, to)?;
    Ok(Json(serde_json::to_value(analytics).map_err(|e| {
        ApiError::Internal(e.to_string())
    })?))
}

/// Admin credit grant.
#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    /// Target company.
    pub company_id: CompanyId,
    /// Credits to add. Must be positive.
    pub amount: i64,
    /// Audit-trail reason.
    pub reason: String,
}

/// `POST /api/credits/add` (admin key)
pub async fn admin_add_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(req): Json<AddCreditsRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    let transaction = state.credits().add_credits(
        &req.company_id,
        req.amount,
        req.reason,
        admin.admin_id.clone(),
    )?;

    info!(
        company_id = %req.company_id,
        amount = req.amount,
        admin_id = %admin.admin_id,
        "Admin credit grant"
    );

    Ok(Json(json!({
        "transaction": transaction,
        "balance": transaction.balance_after,
    })))
}
