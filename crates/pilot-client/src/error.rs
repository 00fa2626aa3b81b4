//! Client error types.

/// Errors that can occur when using the pilot client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The company's balance does not cover the request.
    #[error("insufficient credits: available={credits_available}, estimated={estimated_tokens}")]
    InsufficientCredits {
        /// Current balance.
        credits_available: i64,
        /// Estimated cost of the rejected request.
        estimated_tokens: i64,
    },

    /// The session changed since this client read it. Re-fetch and retry.
    #[error("version conflict: expected {expected}, session is at {actual}")]
    VersionConflict {
        /// Version the request was based on.
        expected: i64,
        /// Version currently stored.
        actual: i64,
    },

    /// The game document was rejected by validation.
    #[error("game validation failed: {message}")]
    Validation {
        /// Server-side validation message.
        message: String,
        /// Field-keyed issues.
        issues: Vec<serde_json::Value>,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
