//! `RocksDB` storage layer for pilot.
//!
//! Persists companies, the credit ledger, game sessions, and published game
//! records using `RocksDB` column families, with CBOR-encoded values.
//!
//! # Architecture
//!
//! - `companies` / `companies_by_owner`: billing tenants and an owner index
//! - `transactions` / `transactions_by_company`: the append-only ledger; the
//!   index key embeds the ULID so per-company scans are time-ordered
//! - `sessions` / `sessions_by_workspace`: versioned game sessions
//! - `games`, plus share-token and domain lookup tables
//! - `processed_payments`: webhook idempotency
//!
//! Balance changes and session turns go through compound operations that
//! hold a per-entity lock across the read-modify-write and commit with a
//! single `WriteBatch`, so a failed deduction or a version conflict leaves
//! nothing behind.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use pilot_core::{
    Company, CompanyId, CreditTransaction, GameId, GameRecord, GameSession, SessionId,
    TransactionId, TransactionMetadata, UserId, WorkspaceId,
};

/// One chat turn to append to a session.
#[derive(Debug, Clone)]
pub struct SessionTurn {
    /// Replacement game document, when the turn changed the game. `None`
    /// leaves the document and version untouched.
    pub game_json: Option<serde_json::Value>,

    /// The user's message.
    pub user_message: String,

    /// The assistant's reply.
    pub assistant_reply: String,

    /// Assistant reasoning narrative, when the provider supplied one.
    pub thinking_process: Option<String>,
}

/// The storage trait defining all database operations.
///
/// Abstracts the storage layer so handlers and the credit manager can be
/// tested against any implementation.
pub trait Store: Send + Sync {
    // =========================================================================
    // Company Operations
    // =========================================================================

    /// Insert or update a company record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_company(&self, company: &Company) -> Result<()>;

    /// Get a company by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_company(&self, company_id: &CompanyId) -> Result<Option<Company>>;

    /// List companies owned by a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_companies_by_owner(&self, owner: &UserId) -> Result<Vec<Company>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Get a transaction by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId)
        -> Result<Option<CreditTransaction>>;

    /// List transactions for a company, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_company(
        &self,
        company_id: &CompanyId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    /// List a company's transactions created in `[from, to)`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_in_range(
        &self,
        company_id: &CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CreditTransaction>>;

    /// Deduct credits from a company and append the ledger entry, atomically
    /// and serialized against other balance changes for the same company.
    ///
    /// Fails closed: on any error the balance and the ledger are untouched.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the company doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is too low.
    fn deduct_credits(
        &self,
        company_id: &CompanyId,
        amount: i64,
        description: String,
        metadata: TransactionMetadata,
    ) -> Result<CreditTransaction>;

    /// Add credits to a company and append the ledger entry atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the company doesn't exist.
    fn add_credits(
        &self,
        company_id: &CompanyId,
        amount: i64,
        description: String,
        metadata: TransactionMetadata,
    ) -> Result<CreditTransaction>;

    /// Apply a payment: add credits, append the ledger entry, and mark the
    /// payment id processed, atomically. Replays of the same payment id are
    /// rejected.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the company doesn't exist.
    /// - `StoreError::DuplicatePayment` if the payment was already applied.
    fn apply_payment(
        &self,
        company_id: &CompanyId,
        amount: i64,
        payment_id: &str,
        amount_cents: i64,
    ) -> Result<CreditTransaction>;

    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Insert or update a session record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_session(&self, session: &GameSession) -> Result<()>;

    /// Get a session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_session(&self, session_id: &SessionId) -> Result<Option<GameSession>>;

    /// List sessions in a workspace, most recently modified first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_sessions_by_workspace(&self, workspace: &WorkspaceId) -> Result<Vec<GameSession>>;

    /// Delete a session and its index entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the session doesn't exist.
    fn delete_session(&self, session_id: &SessionId) -> Result<()>;

    /// Append a chat turn to a session, bumping the version when the turn
    /// carries a new game document. Serialized per session; when
    /// `expected_version` is given the update is rejected if the session
    /// moved on since the caller read it.
    ///
    /// Returns the updated session.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the session doesn't exist.
    /// - `StoreError::SessionNotActive` if the session is archived.
    /// - `StoreError::VersionConflict` if `expected_version` doesn't match.
    fn append_session_turn(
        &self,
        session_id: &SessionId,
        expected_version: Option<i64>,
        turn: SessionTurn,
    ) -> Result<GameSession>;

    // =========================================================================
    // Game Operations
    // =========================================================================

    /// Insert or update a game record, maintaining the company index and the
    /// share-token and domain lookup tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_game(&self, game: &GameRecord) -> Result<()>;

    /// Get a game by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_game(&self, game_id: &GameId) -> Result<Option<GameRecord>>;

    /// List games owned by a company.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_games_by_company(&self, company_id: &CompanyId) -> Result<Vec<GameRecord>>;

    /// Look up a game by its public share token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_game_by_share_token(&self, token: &str) -> Result<Option<GameRecord>>;

    /// Look up a game by its custom domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_game_by_domain(&self, domain: &str) -> Result<Option<GameRecord>>;

    /// Increment a game's play counter, serialized against other plays of
    /// the same game so concurrent views are never lost.
    ///
    /// Returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the game doesn't exist.
    fn increment_play_count(&self, game_id: &GameId) -> Result<GameRecord>;

    /// Attach a normalized custom domain to a game, enforcing that no other
    /// game holds it.
    ///
    /// Returns the updated record with `domain_status` pending.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the game doesn't exist.
    /// - `StoreError::DomainTaken` if another game owns the domain.
    fn attach_domain(&self, game_id: &GameId, domain: &str) -> Result<GameRecord>;

    /// Delete a game and all its index entries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the game doesn't exist.
    fn delete_game(&self, game_id: &GameId) -> Result<()>;
}
