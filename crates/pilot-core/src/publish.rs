//! Published game records: custom domains and share settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CompanyId, GameId, SessionId, WorkspaceId};

/// Minimum length of a normalized domain ("a.io").
const MIN_DOMAIN_LEN: usize = 4;

/// A game published from a session, addressable by share link or custom
/// domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    /// Unique game identifier.
    pub id: GameId,

    /// Owning company.
    pub company_id: CompanyId,

    /// Owning workspace.
    pub workspace_id: WorkspaceId,

    /// Session the published build came from.
    pub session_id: Option<SessionId>,

    /// Display title.
    pub title: String,

    /// Opaque token in the public share URL. Present once sharing is
    /// enabled.
    pub share_token: Option<String>,

    /// Sharing options.
    pub share_settings: ShareSettings,

    /// Normalized custom domain, when one is attached.
    pub custom_domain: Option<String>,

    /// Verification state of the custom domain.
    pub domain_status: DomainStatus,

    /// Public build URL, when a build has been published.
    pub build_url: Option<String>,

    /// Total plays across all share surfaces.
    pub play_count: i64,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl GameRecord {
    /// Create an unpublished record owned by the given company/workspace.
    #[must_use]
    pub fn new(company_id: CompanyId, workspace_id: WorkspaceId, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: GameId::generate(),
            company_id,
            workspace_id,
            session_id: None,
            title,
            share_token: None,
            share_settings: ShareSettings::default(),
            custom_domain: None,
            domain_status: DomainStatus::None,
            build_url: None,
            play_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Detach the custom domain.
    pub fn clear_custom_domain(&mut self) {
        self.custom_domain = None;
        self.domain_status = DomainStatus::None;
        self.updated_at = Utc::now();
    }
}

/// Custom-domain verification state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    /// No custom domain attached.
    None,
    /// Domain attached, DNS not yet verified.
    Pending,
    /// DNS verified, domain serving.
    Active,
    /// Verification failed.
    Failed,
}

/// Options controlling the public share surface of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSettings {
    /// Whether the share link works at all.
    pub public: bool,

    /// Allow embedding in third-party pages.
    pub allow_embedding: bool,

    /// Show the author's workspace name on the share page.
    pub show_author: bool,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            public: false,
            allow_embedding: true,
            show_author: true,
        }
    }
}

/// Custom-domain rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Too short after normalization.
    #[error("domain is too short")]
    TooShort,

    /// Contains characters outside the hostname alphabet.
    #[error("domain contains invalid characters")]
    InvalidCharacters,

    /// Bare IP addresses are not accepted.
    #[error("IP addresses cannot be used as custom domains")]
    IpAddress,

    /// Localhost and friends are not publishable.
    #[error("local hostnames cannot be used as custom domains")]
    LocalHostname,

    /// No dot, so not a public hostname.
    #[error("domain must include a top-level domain")]
    MissingTld,
}

/// Normalize user-entered domain input to a bare lowercase hostname.
///
/// Strips an `http://`/`https://` scheme and any trailing path slash, then
/// validates the remainder as a public hostname: no IPs, no localhost, at
/// least one dot, letters/digits/hyphens/dots only.
///
/// # Errors
///
/// Returns the first rule the input breaks.
pub fn normalize_domain(raw: &str) -> Result<String, DomainError> {
    let mut domain = raw.trim().to_ascii_lowercase();
    if let Some(rest) = domain.strip_prefix("https://") {
        domain = rest.to_owned();
    } else if let Some(rest) = domain.strip_prefix("http://") {
        domain = rest.to_owned();
    }
    let domain = domain.trim_end_matches('/').to_owned();

    if domain.len() < MIN_DOMAIN_LEN {
        return Err(DomainError::TooShort);
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(DomainError::InvalidCharacters);
    }
    if domain.parse::<std::net::IpAddr>().is_ok() {
        return Err(DomainError::IpAddress);
    }
    if domain == "localhost" || domain.ends_with(".localhost") || domain.ends_with(".local") {
        return Err(DomainError::LocalHostname);
    }
    if !domain.contains('.') {
        return Err(DomainError::MissingTld);
    }
    if domain.split('.').any(str::is_empty) {
        return Err(DomainError::InvalidCharacters);
    }

    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_and_trailing_slash_stripped() {
        assert_eq!(
            normalize_domain("https://my-game.com/").unwrap(),
            "my-game.com"
        );
        assert_eq!(
            normalize_domain("http://Play.Example.IO").unwrap(),
            "play.example.io"
        );
    }

    #[test]
    fn ip_addresses_rejected() {
        assert_eq!(
            normalize_domain("192.168.1.1"),
            Err(DomainError::IpAddress)
        );
        assert_eq!(normalize_domain("::1"), Err(DomainError::InvalidCharacters));
    }

    #[test]
    fn local_hostnames_rejected() {
        assert_eq!(
            normalize_domain("localhost"),
            Err(DomainError::LocalHostname)
        );
        assert_eq!(
            normalize_domain("game.localhost"),
            Err(DomainError::LocalHostname)
        );
    }

    #[test]
    fn bare_word_and_short_input_rejected() {
        assert_eq!(normalize_domain("io"), Err(DomainError::TooShort));
        assert_eq!(normalize_domain("mygame"), Err(DomainError::MissingTld));
        assert_eq!(
            normalize_domain("my game.com"),
            Err(DomainError::InvalidCharacters)
        );
        assert_eq!(
            normalize_domain("my..game.com"),
            Err(DomainError::InvalidCharacters)
        );
    }

    #[test]
    fn clearing_domain_resets_status() {
        let mut game = GameRecord::new(
            CompanyId::generate(),
            WorkspaceId::generate(),
            "Coin Chase".into(),
        );
        game.custom_domain = Some("my-game.com".into());
        game.domain_status = DomainStatus::Pending;

        game.clear_custom_domain();
        assert_eq!(game.custom_domain, None);
        assert_eq!(game.domain_status, DomainStatus::None);
    }
}
