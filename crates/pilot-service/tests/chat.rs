//! Credit-gated chat integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn chat_deducts_actual_usage() {
    let harness = TestHarness::new();
    harness.create_company().await;

    // 50 input + ceil(11 / 4) output tokens from the static provider.
    harness.provider.push_reply("hello there", None);

    let response = harness
        .server
        .post("/api/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "say hello"}))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["response"], "hello there");
    assert_eq!(body["provider"], "static");
    assert_eq!(body["usage"]["input_tokens"], 50);
    assert_eq!(body["usage"]["output_tokens"], 2);
    assert_eq!(body["credits"]["deducted"], 52);
    assert_eq!(body["credits"]["remaining"], 48);
}

#[tokio::test]
async fn chat_rejects_with_402_when_broke() {
    let harness = TestHarness::new();
    harness.create_company().await;

    // Burn almost the whole welcome balance.
    harness.provider.push_reply("x".repeat(180), None);
    harness
        .server
        .post("/api/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "big reply please"}))
        .await
        .assert_status_ok();

    // Large message so the estimate exceeds what's left.
    let response = harness
        .server
        .post("/api/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "words ".repeat(100)}))
        .await;
    assert_eq!(response.status_code(), 402);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "insufficient_credits");
    assert!(body["credits_available"].as_i64().is_some());
    assert!(body["estimated_tokens"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn provider_failure_deducts_nothing() {
    let harness = TestHarness::new();
    harness.create_company().await;

    harness.provider.push_error(
        pilot_service::providers::ProviderError::Http("connection refused".into()),
    );

    let response = harness
        .server
        .post("/api/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "hi"}))
        .await;
    assert_eq!(response.status_code(), 500);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "provider_error");

    // Balance untouched.
    let response = harness
        .server
        .get("/api/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let balance: serde_json::Value = response.json();
    assert_eq!(balance["credits"], 100);
}

#[tokio::test]
async fn chat_streams_when_requested() {
    let harness = TestHarness::new();
    harness.create_company().await;
    harness.provider.push_reply("streamed reply text", None);

    let response = harness
        .server
        .post("/api/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "stream it", "stream": true}))
        .await;
    response.assert_status_ok();

    let text = response.text();
    assert!(text.contains("event: message"));
    assert!(text.contains("streamed reply text"));
    assert!(text.contains("event: done"));
    assert!(text.contains("credits_deducted"));
}

#[tokio::test]
async fn assist_gates_without_calling_provider() {
    let harness = TestHarness::new();
    harness.create_company().await;

    let response = harness
        .server
        .post("/api/assist")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "which provider will answer?"}))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["provider"], "static");
    assert_eq!(body["model"], "static-1");
    assert_eq!(body["credits_available"], 100);
    assert!(body["estimated_tokens"].as_i64().unwrap() > 0);

    // No deduction happened.
    let response = harness
        .server
        .get("/api/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let balance: serde_json::Value = response.json();
    assert_eq!(balance["credits"], 100);
}

#[tokio::test]
async fn unknown_provider_is_a_bad_request() {
    let harness = TestHarness::new();
    harness.create_company().await;

    let response = harness
        .server
        .post("/api/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "hi", "provider": "nonexistent"}))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn providers_listing_marks_default() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/api/providers")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["default"], "static");
    let providers = body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0]["name"], "static");
    assert_eq!(providers[0]["is_default"], true);
}
