//! Service configuration.

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/pilot").
    pub data_dir: String,

    /// JWT validation base URL.
    pub auth_base_url: String,

    /// Expected JWT audience (default: "pilot").
    pub auth_audience: String,

    /// Admin API key for privileged endpoints (credit grants).
    pub admin_api_key: Option<String>,

    /// Shared secret for payment webhook signatures.
    pub payments_webhook_secret: Option<String>,

    /// Anthropic API key (optional).
    pub anthropic_api_key: Option<String>,

    /// OpenAI API key (optional).
    pub openai_api_key: Option<String>,

    /// Ollama base URL for local models (optional, OpenAI-compatible API).
    pub ollama_base_url: Option<String>,

    /// GDevelop engine settings.
    pub gdevelop: GDevelopConfig,

    /// Public IP of this server, included in custom-domain DNS instructions.
    pub server_ip: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// GDevelop engine configuration.
#[derive(Debug, Clone)]
pub struct GDevelopConfig {
    /// Whether the GDevelop endpoints are enabled.
    pub enabled: bool,

    /// Path to the GDevelop export CLI binary.
    pub cli_path: String,

    /// Directory where session game documents are written for builds.
    pub sessions_dir: String,

    /// Directory where preview and export outputs land.
    pub builds_dir: String,

    /// Timeout for preview builds, in seconds.
    pub preview_timeout_seconds: u64,

    /// Timeout for export builds, in seconds.
    pub export_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/pilot".into()),
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .unwrap_or_else(|_| "https://auth.surrealpilot.com".into()),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "pilot".into()),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            payments_webhook_secret: std::env::var("PAYMENTS_WEBHOOK_SECRET").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL").ok(),
            gdevelop: GDevelopConfig::from_env(),
            server_ip: std::env::var("SERVER_IP").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4 * 1024 * 1024), // game documents can be large
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
        }
    }
}

impl GDevelopConfig {
    fn from_env() -> Self {
        Self {
            enabled: std::env::var("GDEVELOP_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            cli_path: std::env::var("GDEVELOP_CLI_PATH").unwrap_or_else(|_| "gdexport".into()),
            sessions_dir: std::env::var("GDEVELOP_SESSIONS_DIR")
                .unwrap_or_else(|_| "/data/pilot/gdevelop/sessions".into()),
            builds_dir: std::env::var("GDEVELOP_BUILDS_DIR")
                .unwrap_or_else(|_| "/data/pilot/gdevelop/builds".into()),
            preview_timeout_seconds: std::env::var("GDEVELOP_PREVIEW_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            export_timeout_seconds: std::env::var("GDEVELOP_EXPORT_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(180),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/pilot".into(),
            auth_base_url: "https://auth.surrealpilot.com".into(),
            auth_audience: "pilot".into(),
            admin_api_key: None,
            payments_webhook_secret: None,
            anthropic_api_key: None,
            openai_api_key: None,
            ollama_base_url: None,
            gdevelop: GDevelopConfig::default(),
            server_ip: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 4 * 1024 * 1024,
            request_timeout_seconds: 120,
        }
    }
}

impl Default for GDevelopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cli_path: "gdexport".into(),
            sessions_dir: "/data/pilot/gdevelop/sessions".into(),
            builds_dir: "/data/pilot/gdevelop/builds".into(),
            preview_timeout_seconds: 60,
            export_timeout_seconds: 180,
        }
    }
}
