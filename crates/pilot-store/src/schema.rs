//! Column family layout.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary company records, keyed by `company_id`.
    pub const COMPANIES: &str = "companies";

    /// Index: companies by owner, keyed by `owner_user_id || company_id`.
    /// Value is empty (index only).
    pub const COMPANIES_BY_OWNER: &str = "companies_by_owner";

    /// Credit transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by company, keyed by
    /// `company_id || transaction_id`. The ULID suffix makes the index
    /// time-ordered, so month windows are range scans.
    pub const TRANSACTIONS_BY_COMPANY: &str = "transactions_by_company";

    /// Game sessions, keyed by `session_id`.
    pub const SESSIONS: &str = "sessions";

    /// Index: sessions by workspace, keyed by `workspace_id || session_id`.
    pub const SESSIONS_BY_WORKSPACE: &str = "sessions_by_workspace";

    /// Published game records, keyed by `game_id`.
    pub const GAMES: &str = "games";

    /// Index: games by company, keyed by `company_id || game_id`.
    pub const GAMES_BY_COMPANY: &str = "games_by_company";

    /// Lookup: share token -> `game_id`.
    pub const SHARE_TOKENS: &str = "share_tokens";

    /// Lookup: custom domain -> `game_id`. Doubles as the uniqueness check.
    pub const DOMAINS: &str = "domains";

    /// Processed payment ids, for webhook idempotency.
    pub const PROCESSED_PAYMENTS: &str = "processed_payments";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::COMPANIES,
        cf::COMPANIES_BY_OWNER,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_COMPANY,
        cf::SESSIONS,
        cf::SESSIONS_BY_WORKSPACE,
        cf::GAMES,
        cf::GAMES_BY_COMPANY,
        cf::SHARE_TOKENS,
        cf::DOMAINS,
        cf::PROCESSED_PAYMENTS,
    ]
}
