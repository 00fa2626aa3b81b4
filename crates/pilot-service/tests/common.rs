//! Common test utilities for pilot-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use pilot_core::UserId;
use pilot_service::providers::StaticProvider;
use pilot_service::{create_router, AppState, GDevelopConfig, ProviderRegistry, ServiceConfig};
use pilot_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database and build dirs.
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// Scriptable AI provider; push replies before calling chat endpoints.
    pub provider: Arc<StaticProvider>,
    /// The admin API key accepted by the server.
    pub admin_key: String,
    /// The webhook signing secret accepted by the server.
    pub webhook_secret: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and a scripted
    /// provider.
    pub fn new() -> Self {
        Self::new_with(|_| {})
    }

    /// Create a harness with configuration overrides applied on top of the
    /// test defaults.
    pub fn new_with(configure: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path().join("db")).expect("Failed to open store");

        let admin_key = "test-admin-key".to_string();
        let webhook_secret = "test-webhook-secret".to_string();

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_base_url: "http://localhost".into(),
            auth_audience: "pilot".into(),
            admin_api_key: Some(admin_key.clone()),
            payments_webhook_secret: Some(webhook_secret.clone()),
            anthropic_api_key: None,
            openai_api_key: None,
            ollama_base_url: None,
            gdevelop: GDevelopConfig {
                enabled: true,
                // Accepts any arguments and exits 0, so builds "succeed".
                cli_path: "true".into(),
                sessions_dir: temp_dir.path().join("sessions").to_string_lossy().into(),
                builds_dir: temp_dir.path().join("builds").to_string_lossy().into(),
                preview_timeout_seconds: 5,
                export_timeout_seconds: 5,
            },
            server_ip: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };
        configure(&mut config);

        let provider = Arc::new(StaticProvider::new());
        let mut registry = ProviderRegistry::empty();
        registry.insert(Arc::clone(&provider) as Arc<dyn pilot_service::ChatProvider>);

        let state = AppState::with_providers(Arc::new(store), config, Arc::new(registry));
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id,
            provider,
            admin_key,
            webhook_secret,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        let other_user = UserId::generate();
        format!("Bearer test-token:{other_user}")
    }

    /// Register a company for the test user and return its id and the
    /// welcome balance.
    pub async fn create_company(&self) -> (String, i64) {
        let response = self
            .server
            .post("/api/companies")
            .add_header("authorization", self.user_auth_header())
            .json(&json!({"name": "Test Studio"}))
            .await;
        assert_eq!(response.status_code(), 201, "{}", response.text());

        let body: serde_json::Value = response.json();
        (
            body["id"].as_str().expect("company id").to_string(),
            body["credits"].as_i64().expect("credits"),
        )
    }

    /// Grant extra credits to a company through the admin endpoint.
    pub async fn grant_credits(&self, company_id: &str, amount: i64) {
        self.server
            .post("/api/credits/add")
            .add_header("x-admin-key", self.admin_key.clone())
            .json(&json!({
                "company_id": company_id,
                "amount": amount,
                "reason": "test grant",
            }))
            .await
            .assert_status_ok();
    }

    /// HMAC signature for a webhook body, as the processor would send it.
    pub fn sign_webhook(&self, body: &str) -> String {
        pilot_service::crypto::hmac_sha256_hex(&self.webhook_secret, body)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
