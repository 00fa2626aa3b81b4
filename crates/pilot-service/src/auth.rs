//! Authentication extractors.
//!
//! - `AuthUser` - end-user authentication via JWT validated against JWKS
//! - `AdminAuth` - admin authentication for privileged endpoints

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use pilot_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// How long to cache JWKS keys before refreshing.
const JWKS_CACHE_DURATION: Duration = Duration::from_secs(3600);

/// Timeout for JWKS fetch requests.
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// An authenticated user extracted from a JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// The raw subject claim from the JWT.
    pub subject: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        // Allow test tokens in testing only.
        // This bypass is gated behind #[cfg(test)] or the "test-auth" feature
        // to ensure it is never active in production builds.
        #[cfg(any(test, feature = "test-auth"))]
        if let Some(user_id_str) = token.strip_prefix("test-token:") {
            let user_id = user_id_str
                .parse::<UserId>()
                .map_err(|_| ApiError::Unauthorized)?;

            return Ok(AuthUser {
                user_id,
                subject: user_id_str.to_string(),
            });
        }

        let claims = validate_jwt(token, state).await?;

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthUser {
            user_id,
            subject: claims.sub,
        })
    }
}

/// Admin authentication via the `X-Admin-Key` header.
///
/// Used for operator endpoints like manual credit grants.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for the transaction audit trail).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if !crate::crypto::constant_time_eq(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Audience (can be string or array).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Issuer.
    pub iss: String,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    pub iat: i64,
}

/// JWKS (JSON Web Key Set) response structure.
#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

/// Single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// JWKS cache entry.
struct JwksCache {
    /// Reusable HTTP client for JWKS fetches, kept for connection pooling.
    client: reqwest::Client,
    /// Cached keys mapped by kid.
    keys: HashMap<String, DecodingKey>,
    /// Default key (for tokens without kid).
    default_key: Option<DecodingKey>,
    /// When the cache was last updated.
    last_updated: Instant,
}

impl JwksCache {
    fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            keys: HashMap::new(),
            default_key: None,
            // Start expired to force the initial fetch.
            last_updated: Instant::now()
                .checked_sub(JWKS_CACHE_DURATION)
                .unwrap_or_else(Instant::now),
        }
    }

    fn is_expired(&self) -> bool {
        self.last_updated.elapsed() >= JWKS_CACHE_DURATION
    }
}

static JWKS_CACHE: std::sync::OnceLock<RwLock<JwksCache>> = std::sync::OnceLock::new();

fn get_jwks_cache() -> &'static RwLock<JwksCache> {
    JWKS_CACHE.get_or_init(|| RwLock::new(JwksCache::new()))
}

/// Validate a JWT token against the JWKS.
async fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    let header = decode_header(token).map_err(|e| {
        tracing::debug!(error = %e, "Failed to decode JWT header");
        ApiError::Unauthorized
    })?;

    let decoding_key = get_decoding_key(header.kid.as_deref(), state).await?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[&state.config.auth_audience]);
    validation.set_issuer(&[&state.config.auth_base_url]);

    let token_data = decode::<JwtClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}

/// Get a decoding key from cache or fetch from the JWKS endpoint.
async fn get_decoding_key(kid: Option<&str>, state: &AppState) -> Result<DecodingKey, ApiError> {
    let cache = get_jwks_cache();

    {
        let cache_read = cache.read().await;
        if !cache_read.is_expired() {
            if let Some(kid) = kid {
                if let Some(key) = cache_read.keys.get(kid) {
                    return Ok(key.clone());
                }
            } else if let Some(key) = &cache_read.default_key {
                return Ok(key.clone());
            }
        }
    }

    let jwks = fetch_jwks(state).await?;

    let mut cache_write = cache.write().await;
    cache_write.keys.clear();
    cache_write.default_key = None;
    cache_write.last_updated = Instant::now();

    for jwk in &jwks.keys {
        if let Some(decoding_key) = jwk_to_decoding_key(jwk) {
            if let Some(ref key_kid) = jwk.kid {
                cache_write
                    .keys
                    .insert(key_kid.clone(), decoding_key.clone());
            }
            if cache_write.default_key.is_none() {
                cache_write.default_key = Some(decoding_key);
            }
        }
    }

    if let Some(kid) = kid {
        cache_write
            .keys
            .get(kid)
            .cloned()
            .ok_or(ApiError::Unauthorized)
    } else {
        cache_write
            .default_key
            .clone()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Fetch JWKS from the auth provider.
async fn fetch_jwks(state: &AppState) -> Result<Jwks, ApiError> {
    let jwks_url = format!("{}/.well-known/jwks.json", state.config.auth_base_url);

    tracing::debug!(url = %jwks_url, "Fetching JWKS");

    let client = {
        let cache_read = get_jwks_cache().read().await;
        cache_read.client.clone()
    };

    let response = client.get(&jwks_url).send().await.map_err(|e| {
        tracing::error!(error = %e, url = %jwks_url, "Failed to fetch JWKS");
        ApiError::Internal("failed to fetch authentication keys".into())
    })?;

    if !response.status().is_success() {
        tracing::error!(
            status = %response.status(),
            url = %jwks_url,
            "JWKS fetch returned non-success status"
        );
        return Err(ApiError::Internal(
            "failed to fetch authentication keys".into(),
        ));
    }

    let jwks: Jwks = response.json().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to parse JWKS response");
        ApiError::Internal("failed to parse authentication keys".into())
    })?;

    tracing::info!(keys_count = %jwks.keys.len(), "JWKS fetched successfully");

    Ok(jwks)
}

/// Convert a JWK to a `DecodingKey`. Only RSA keys are supported.
fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    if jwk.kty != "RSA" {
        tracing::debug!(kty = %jwk.kty, "Skipping non-RSA JWK");
        return None;
    }

    let n = jwk.n.as_ref()?;
    let e = jwk.e.as_ref()?;

    DecodingKey::from_rsa_components(n, e).ok()
}
