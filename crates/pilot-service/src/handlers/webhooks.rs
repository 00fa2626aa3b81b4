//! Payment webhook.
//!
//! The payment processor posts signed events here. Signatures are
//! HMAC-SHA256 over the raw body; replayed payment ids are absorbed by the
//! store's idempotency table rather than credited twice.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pilot_core::CompanyId;

use crate::crypto::{constant_time_eq, hmac_sha256_hex};
use crate::error::ApiError;
use crate::state::AppState;

/// Payment webhook payload.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    /// Event type; only `payment.succeeded` grants credits.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Processor-side payment id, used for idempotency.
    pub payment_id: String,
    /// Company the purchase belongs to.
    pub company_id: CompanyId,
    /// Credits purchased.
    pub credits: i64,
    /// Amount paid, in cents.
    pub amount_cents: i64,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// `POST /webhooks/payments`
pub async fn payments_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.config.payments_webhook_secret {
        let signature = headers
            .get("x-webhook-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing webhook signature".into()))?;

        let expected = hmac_sha256_hex(secret, &body);
        if !constant_time_eq(signature, &expected) {
            warn!("Invalid payment webhook signature");
            return Err(ApiError::BadRequest("Invalid webhook signature".into()));
        }
    } else {
        warn!("PAYMENTS_WEBHOOK_SECRET not configured - skipping signature verification");
    }

    let webhook: PaymentWebhook =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    info!(
        event_type = %webhook.event_type,
        payment_id = %webhook.payment_id,
        company_id = %webhook.company_id,
        "Received payment webhook"
    );

    if webhook.event_type != "payment.succeeded" {
        return Ok(Json(WebhookResponse { received: true }));
    }

    if webhook.credits <= 0 {
        return Err(ApiError::BadRequest("credits must be positive".into()));
    }

    match state.store.apply_payment(
        &webhook.company_id,
        webhook.credits,
        &webhook.payment_id,
        webhook.amount_cents,
    ) {
        Ok(transaction) => {
            info!(
                payment_id = %webhook.payment_id,
                credits = webhook.credits,
                balance = transaction.balance_after,
                "Payment credited"
            );
        }
        // A replayed delivery of the same payment is acknowledged, not
        // credited again.
        Err(pilot_store::StoreError::DuplicatePayment { payment_id }) => {
            info!(%payment_id, "Duplicate payment webhook ignored");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(Json(WebhookResponse { received: true }))
}
