//! Error types for pilot storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind ("company", "session", "game", "transaction").
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// Insufficient credits for a deduction.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Amount the deduction needed.
        required: i64,
    },

    /// The session changed since the caller read it.
    #[error("version conflict: expected version {expected}, session is at {actual}")]
    VersionConflict {
        /// Version the caller based its update on.
        expected: i64,
        /// Version currently stored.
        actual: i64,
    },

    /// The session is archived and rejects modifications.
    #[error("session is not active: {status}")]
    SessionNotActive {
        /// Current lifecycle state.
        status: String,
    },

    /// A payment was already applied (webhook retry).
    #[error("payment already processed: {payment_id}")]
    DuplicatePayment {
        /// The payment reference that was replayed.
        payment_id: String,
    },

    /// The custom domain is attached to another game.
    #[error("domain already in use: {domain}")]
    DomainTaken {
        /// The normalized domain.
        domain: String,
    },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
