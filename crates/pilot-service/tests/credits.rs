//! Company and credit endpoint integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

// ============================================================================
// Companies
// ============================================================================

#[tokio::test]
async fn create_company_grants_welcome_credits() {
    let harness = TestHarness::new();
    let (_, credits) = harness.create_company().await;
    assert_eq!(credits, 100);

    let response = harness
        .server
        .get("/api/companies/me")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["plan"], "starter");
    assert_eq!(body["credits"], 100);
}

#[tokio::test]
async fn second_company_for_same_user_conflicts() {
    let harness = TestHarness::new();
    harness.create_company().await;

    let response = harness
        .server
        .post("/api/companies")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"name": "Another"}))
        .await;
    response.assert_status_conflict();
}

#[tokio::test]
async fn company_endpoints_require_auth() {
    let harness = TestHarness::new();
    harness.server.get("/api/companies/me").await.assert_status_unauthorized();
    harness.server.get("/api/credits/balance").await.assert_status_unauthorized();
}

// ============================================================================
// Balance and transactions
// ============================================================================

#[tokio::test]
async fn balance_reflects_admin_grant() {
    let harness = TestHarness::new();
    let (company_id, _) = harness.create_company().await;

    let response = harness
        .server
        .post("/api/credits/add")
        .add_header("x-admin-key", harness.admin_key.clone())
        .json(&json!({
            "company_id": company_id,
            "amount": 500,
            "reason": "Launch promo",
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 600);

    let response = harness
        .server
        .get("/api/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 600);
    assert_eq!(body["plan"], "starter");
}

#[tokio::test]
async fn admin_grant_rejects_wrong_key() {
    let harness = TestHarness::new();
    let (company_id, _) = harness.create_company().await;

    let response = harness
        .server
        .post("/api/credits/add")
        .add_header("x-admin-key", "wrong-key")
        .json(&json!({
            "company_id": company_id,
            "amount": 500,
            "reason": "nope",
        }))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn transactions_list_newest_first() {
    let harness = TestHarness::new();
    let (company_id, _) = harness.create_company().await;

    for (amount, reason) in [(10, "first"), (20, "second")] {
        harness
            .server
            .post("/api/credits/add")
            .add_header("x-admin-key", harness.admin_key.clone())
            .json(&json!({
                "company_id": company_id,
                "amount": amount,
                "reason": reason,
            }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get("/api/credits/transactions")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["description"], "second");
    assert_eq!(transactions[1]["description"], "first");
}

// ============================================================================
// Analytics
// ============================================================================

#[tokio::test]
async fn analytics_totals_debits_and_credits() {
    let harness = TestHarness::new();
    let (company_id, _) = harness.create_company().await;

    harness
        .server
        .post("/api/credits/add")
        .add_header("x-admin-key", harness.admin_key.clone())
        .json(&json!({"company_id": company_id, "amount": 300, "reason": "grant"}))
        .await
        .assert_status_ok();

    harness.provider.push_reply("hello there", None);
    harness
        .server
        .post("/api/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "hi"}))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/api/credits/analytics")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_credits"], 300);
    assert!(body["total_debits"].as_i64().unwrap() > 0);
    assert_eq!(body["transaction_count"], 2);
}

#[tokio::test]
async fn analytics_rejects_inverted_window() {
    let harness = TestHarness::new();
    harness.create_company().await;

    let response = harness
        .server
        .get("/api/credits/analytics?from=2026-02-01T00:00:00Z&to=2026-01-01T00:00:00Z")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_bad_request();
}

// ============================================================================
// Payments webhook
// ============================================================================

#[tokio::test]
async fn payment_webhook_credits_once() {
    let harness = TestHarness::new();
    let (company_id, _) = harness.create_company().await;

    let body = json!({
        "type": "payment.succeeded",
        "payment_id": "pay_123",
        "company_id": company_id,
        "credits": 1000,
        "amount_cents": 999,
    })
    .to_string();
    let signature = harness.sign_webhook(&body);

    for _ in 0..2 {
        let response = harness
            .server
            .post("/webhooks/payments")
            .add_header("x-webhook-signature", signature.clone())
            .bytes(body.clone().into())
            .await;
        response.assert_status_ok();
    }

    // Credited exactly once despite the replay.
    let response = harness
        .server
        .get("/api/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let balance: serde_json::Value = response.json();
    assert_eq!(balance["credits"], 1100);
}

#[tokio::test]
async fn payment_webhook_rejects_bad_signature() {
    let harness = TestHarness::new();
    let (company_id, _) = harness.create_company().await;

    let body = json!({
        "type": "payment.succeeded",
        "payment_id": "pay_456",
        "company_id": company_id,
        "credits": 1000,
        "amount_cents": 999,
    })
    .to_string();

    let response = harness
        .server
        .post("/webhooks/payments")
        .add_header("x-webhook-signature", "deadbeef")
        .bytes(body.into())
        .await;
    response.assert_status_bad_request();
}
