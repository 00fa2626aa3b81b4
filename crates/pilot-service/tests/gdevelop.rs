//! GDevelop session flow integration tests.

mod common;

use common::TestHarness;
use pilot_core::WorkspaceId;
use pilot_service::gdevelop::game::starter_game;
use serde_json::json;

fn game_reply(name: &str) -> String {
    format!("Here you go!\n```json\n{}\n```", starter_game(name))
}

/// Register a company and top it up so multi-turn tests never hit the gate.
async fn fund(harness: &TestHarness) {
    let (company_id, _) = harness.create_company().await;
    harness.grant_credits(&company_id, 2000).await;
}

/// Run a creation turn and return the session id.
async fn create_session(harness: &TestHarness) -> String {
    harness.provider.push_reply(game_reply("Coin Chase"), Some("plan".into()));

    let response = harness
        .server
        .post("/api/gdevelop/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "workspace_id": WorkspaceId::generate(),
            "message": "make a coin collecting game",
        }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());

    let body: serde_json::Value = response.json();
    assert_eq!(body["version"], 1);
    assert_eq!(body["game_changed"], true);
    assert_eq!(body["game_title"], "Coin Chase");
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn creation_turn_starts_at_version_one_and_deducts() {
    let harness = TestHarness::new();
    fund(&harness).await;
    create_session(&harness).await;

    let response = harness
        .server
        .get("/api/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let balance: serde_json::Value = response.json();
    assert!(balance["credits"].as_i64().unwrap() < 2100);
}

#[tokio::test]
async fn modification_turn_bumps_version_and_history() {
    let harness = TestHarness::new();
    fund(&harness).await;
    let session_id = create_session(&harness).await;

    harness.provider.push_reply(game_reply("Coin Chase Deluxe"), None);
    let response = harness
        .server
        .post("/api/gdevelop/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"session_id": session_id, "message": "make it deluxe"}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["version"], 2);
    assert_eq!(body["game_changed"], true);

    let response = harness
        .server
        .get(&format!("/api/gdevelop/session/{session_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let session: serde_json::Value = response.json();
    assert_eq!(session["version"], 2);
    assert_eq!(session["conversation_history"].as_array().unwrap().len(), 4);
    assert_eq!(session["status"], "active");
}

#[tokio::test]
async fn conversation_only_turn_keeps_version() {
    let harness = TestHarness::new();
    fund(&harness).await;
    let session_id = create_session(&harness).await;

    harness.provider.push_reply("Coins are worth 10 points.", None);
    let response = harness
        .server
        .post("/api/gdevelop/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"session_id": session_id, "message": "how much per coin?"}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["version"], 1);
    assert_eq!(body["game_changed"], false);
}

#[tokio::test]
async fn invalid_document_is_rejected_with_422() {
    let harness = TestHarness::new();
    harness.create_company().await;

    // Missing properties.name and layouts.
    harness
        .provider
        .push_reply("Done!\n```json\n{\"objects\": []}\n```", None);

    let response = harness
        .server
        .post("/api/gdevelop/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "workspace_id": WorkspaceId::generate(),
            "message": "make something broken",
        }))
        .await;
    assert_eq!(response.status_code(), 422);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "validation_failed");
    assert!(!body["error"]["details"]["issues"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_failures_suggest_simplifications() {
    let harness = TestHarness::new();
    fund(&harness).await;
    let session_id = create_session(&harness).await;

    let mut last = None;
    for _ in 0..3 {
        harness
            .provider
            .push_reply("Done!\n```json\n{\"objects\": []}\n```", None);
        let response = harness
            .server
            .post("/api/gdevelop/chat")
            .add_header("authorization", harness.user_auth_header())
            .json(&json!({"session_id": session_id, "message": "break it"}))
            .await;
        assert_eq!(response.status_code(), 422);
        last = Some(response.json::<serde_json::Value>());
    }

    let body = last.unwrap();
    assert_eq!(body["error"]["code"], "repeated_failures");
    assert!(!body["error"]["details"]["suggestions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn workspace_listing_shows_only_own_sessions() {
    let harness = TestHarness::new();
    fund(&harness).await;

    let workspace_id = WorkspaceId::generate();
    harness.provider.push_reply(game_reply("Coin Chase"), None);
    let response = harness
        .server
        .post("/api/gdevelop/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "workspace_id": workspace_id,
            "message": "make a coin collecting game",
        }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let created: serde_json::Value = response.json();

    let response = harness
        .server
        .get(&format!("/api/gdevelop/sessions?workspace_id={workspace_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["session_id"], created["session_id"]);
    assert_eq!(sessions[0]["game_title"], "Coin Chase");
    assert_eq!(sessions[0]["version"], 1);

    // Another user sees nothing in the same workspace.
    let response = harness
        .server
        .get(&format!("/api/gdevelop/sessions?workspace_id={workspace_id}"))
        .add_header("authorization", TestHarness::other_user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["sessions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn other_users_session_reads_as_missing() {
    let harness = TestHarness::new();
    fund(&harness).await;
    let session_id = create_session(&harness).await;

    let response = harness
        .server
        .get(&format!("/api/gdevelop/session/{session_id}"))
        .add_header("authorization", TestHarness::other_user_auth_header())
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn new_session_requires_workspace() {
    let harness = TestHarness::new();
    harness.create_company().await;

    let response = harness
        .server
        .post("/api/gdevelop/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "no workspace given"}))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn broke_company_gets_402_before_any_provider_call() {
    let harness = TestHarness::new();
    harness.create_company().await;

    // Drain most of the welcome balance (50 input + 40 output tokens).
    harness.provider.push_reply("x".repeat(160), None);
    harness
        .server
        .post("/api/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"message": "drain"}))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/api/gdevelop/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "workspace_id": WorkspaceId::generate(),
            "message": "words ".repeat(200),
        }))
        .await;
    assert_eq!(response.status_code(), 402);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "insufficient_credits");
}

#[tokio::test]
async fn preview_and_export_record_urls() {
    let harness = TestHarness::new();
    fund(&harness).await;
    let session_id = create_session(&harness).await;

    let response = harness
        .server
        .get(&format!("/api/gdevelop/preview/{session_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let preview_url = body["preview_url"].as_str().unwrap().to_string();
    assert!(preview_url.ends_with("/preview/index.html"));

    let response = harness
        .server
        .post(&format!("/api/gdevelop/export/{session_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["download_url"].as_str().unwrap().ends_with("/export/game.zip"));

    let response = harness
        .server
        .get(&format!("/api/gdevelop/session/{session_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    let session: serde_json::Value = response.json();
    assert_eq!(session["preview_url"], preview_url);
    assert!(session["export_url"].as_str().is_some());
}

#[tokio::test]
async fn failing_build_is_422_with_retry_flag() {
    let harness = TestHarness::new_with(|config| {
        config.gdevelop.cli_path = "false".into();
    });
    fund(&harness).await;
    let session_id = create_session(&harness).await;

    let response = harness
        .server
        .get(&format!("/api/gdevelop/preview/{session_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    assert_eq!(response.status_code(), 422);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "cli_error");
    assert_eq!(body["error"]["details"]["is_retryable"], false);

    // The failure is recorded on the session for later inspection.
    let response = harness
        .server
        .get(&format!("/api/gdevelop/session/{session_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    let session: serde_json::Value = response.json();
    assert!(session["error_log"].as_str().is_some());
    assert_eq!(session["status"], "active");
}

#[tokio::test]
async fn disabled_engine_returns_503() {
    let harness = TestHarness::new_with(|config| {
        config.gdevelop.enabled = false;
    });
    harness.create_company().await;

    let response = harness
        .server
        .post("/api/gdevelop/chat")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "workspace_id": WorkspaceId::generate(),
            "message": "hello",
        }))
        .await;
    assert_eq!(response.status_code(), 503);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "gdevelop_disabled");
}

#[tokio::test]
async fn delete_removes_the_session() {
    let harness = TestHarness::new();
    fund(&harness).await;
    let session_id = create_session(&harness).await;

    harness
        .server
        .delete(&format!("/api/gdevelop/session/{session_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_ok();

    harness
        .server
        .get(&format!("/api/gdevelop/session/{session_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_not_found();
}
