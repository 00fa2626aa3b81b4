//! Key encoding for the column families.
//!
//! Primary records are keyed by their 16-byte id. Index keys are
//! `owner_id (16 bytes) || member_id (16 bytes)`; since transaction ids are
//! ULIDs, the transaction index is time-ordered within each company.

use pilot_core::{CompanyId, GameId, SessionId, TransactionId, UserId, WorkspaceId};

/// Key for a company record.
#[must_use]
pub fn company_key(company_id: &CompanyId) -> Vec<u8> {
    company_id.as_bytes().to_vec()
}

/// Index key for a company under its owner.
#[must_use]
pub fn owner_company_key(owner: &UserId, company_id: &CompanyId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(company_id.as_bytes());
    key
}

/// Key for a transaction record.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Index key for a transaction under its company.
#[must_use]
pub fn company_transaction_key(
    company_id: &CompanyId,
    transaction_id: &TransactionId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(company_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Prefix covering every transaction index entry for a company.
#[must_use]
pub fn company_transactions_prefix(company_id: &CompanyId) -> Vec<u8> {
    company_id.as_bytes().to_vec()
}

/// Extract the transaction id from a company-transaction index key.
///
/// # Panics
///
/// Panics if the key is shorter than 32 bytes.
#[must_use]
pub fn transaction_id_from_index_key(key: &[u8]) -> TransactionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    TransactionId::from_bytes(bytes)
}

/// Key for a session record.
#[must_use]
pub fn session_key(session_id: &SessionId) -> Vec<u8> {
    session_id.as_bytes().to_vec()
}

/// Index key for a session under its workspace.
#[must_use]
pub fn workspace_session_key(workspace: &WorkspaceId, session_id: &SessionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(workspace.as_bytes());
    key.extend_from_slice(session_id.as_bytes());
    key
}

/// Key for a game record.
#[must_use]
pub fn game_key(game_id: &GameId) -> Vec<u8> {
    game_id.as_bytes().to_vec()
}

/// Index key for a game under its company.
#[must_use]
pub fn company_game_key(company_id: &CompanyId, game_id: &GameId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(company_id.as_bytes());
    key.extend_from_slice(game_id.as_bytes());
    key
}

/// Extract the trailing 16-byte member id from a 32-byte index key.
///
/// # Panics
///
/// Panics if the key is shorter than 32 bytes.
#[must_use]
pub fn member_id_from_index_key(key: &[u8]) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    bytes
}
