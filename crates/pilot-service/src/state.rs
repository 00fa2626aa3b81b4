//! Application state.

use std::sync::Arc;

use pilot_store::Store;

use crate::config::ServiceConfig;
use crate::credits::CreditManager;
use crate::gdevelop::recovery::ErrorRecovery;
use crate::providers::ProviderRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Configured AI providers.
    pub providers: Arc<ProviderRegistry>,

    /// Per-session error tracking for fallback suggestions.
    pub recovery: Arc<ErrorRecovery>,
}

impl AppState {
    /// Create application state, building the provider registry from the
    /// configuration.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let providers = Arc::new(ProviderRegistry::from_config(&config));
        Self::with_providers(store, config, providers)
    }

    /// Create application state with an explicit provider registry. Used by
    /// tests to inject deterministic providers.
    #[must_use]
    pub fn with_providers(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not configured - admin endpoints are disabled");
        }
        if config.payments_webhook_secret.is_none() {
            tracing::warn!(
                "PAYMENTS_WEBHOOK_SECRET not configured - webhook signatures are not verified"
            );
        }

        Self {
            store,
            config,
            providers,
            recovery: Arc::new(ErrorRecovery::default()),
        }
    }

    /// Credit manager bound to this state's store.
    #[must_use]
    pub fn credits(&self) -> CreditManager {
        CreditManager::new(Arc::clone(&self.store))
    }
}
