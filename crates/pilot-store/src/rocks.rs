//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use pilot_core::{
    Company, CompanyId, CreditTransaction, DomainStatus, GameId, GameRecord, GameSession,
    SessionId, TransactionId, TransactionMetadata, UserId, WorkspaceId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{SessionTurn, Store};

/// Per-entity locks serializing read-modify-write sequences.
///
/// RocksDB write batches are atomic but not isolated; without this, two
/// concurrent deductions could both read the same balance and both commit.
#[derive(Default)]
struct LockMap {
    locks: Mutex<HashMap<[u8; 16], Arc<Mutex<()>>>>,
}

impl LockMap {
    fn entry(&self, key: [u8; 16]) -> Result<Arc<Mutex<()>>> {
        let mut map = self.locks.lock().map_err(|_| lock_poisoned())?;
        Ok(Arc::clone(map.entry(key).or_default()))
    }
}

fn lock_poisoned() -> StoreError {
    StoreError::Database("lock poisoned".into())
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    company_locks: LockMap,
    session_locks: LockMap,
    game_locks: LockMap,
    domain_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "opened store");

        Ok(Self {
            db: Arc::new(db),
            company_locks: LockMap::default(),
            session_locks: LockMap::default(),
            game_locks: LockMap::default(),
            domain_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_cf_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Append a ledger transaction (record plus company index) to a batch.
    fn batch_transaction(&self, batch: &mut WriteBatch, tx: &CreditTransaction) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_company = self.cf(cf::TRANSACTIONS_BY_COMPANY)?;
        let value = Self::serialize(tx)?;
        batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), &value);
        batch.put_cf(
            &cf_by_company,
            keys::company_transaction_key(&tx.company_id, &tx.id),
            [],
        );
        Ok(())
    }

    /// Write an updated company record into a batch.
    fn batch_company(&self, batch: &mut WriteBatch, company: &Company) -> Result<()> {
        let cf_companies = self.cf(cf::COMPANIES)?;
        batch.put_cf(
            &cf_companies,
            keys::company_key(&company.id),
            Self::serialize(company)?,
        );
        Ok(())
    }

    fn require_company(&self, company_id: &CompanyId) -> Result<Company> {
        self.get_company(company_id)?
            .ok_or_else(|| StoreError::not_found("company", company_id))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Company Operations
    // =========================================================================

    fn put_company(&self, company: &Company) -> Result<()> {
        let cf_companies = self.cf(cf::COMPANIES)?;
        let cf_by_owner = self.cf(cf::COMPANIES_BY_OWNER)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_companies,
            keys::company_key(&company.id),
            Self::serialize(company)?,
        );
        batch.put_cf(
            &cf_by_owner,
            keys::owner_company_key(&company.owner_user_id, &company.id),
            [],
        );

        self.write(batch)
    }

    fn get_company(&self, company_id: &CompanyId) -> Result<Option<Company>> {
        self.get_cf_value(cf::COMPANIES, &keys::company_key(company_id))
    }

    fn list_companies_by_owner(&self, owner: &UserId) -> Result<Vec<Company>> {
        let cf_by_owner = self.cf(cf::COMPANIES_BY_OWNER)?;
        let prefix = owner.as_bytes().to_vec();

        let iter = self.db.iterator_cf(
            &cf_by_owner,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut companies = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let company_bytes = keys::member_id_from_index_key(&key);
            if let Some(company) = self.get_cf_value(cf::COMPANIES, &company_bytes)? {
                companies.push(company);
            }
        }

        Ok(companies)
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>> {
        self.get_cf_value(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn list_transactions_by_company(
        &self,
        company_id: &CompanyId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_by_company = self.cf(cf::TRANSACTIONS_BY_COMPANY)?;
        let prefix = keys::company_transactions_prefix(company_id);

        // The ULID suffix keeps index entries time-ordered; collect forward
        // and reverse for newest-first.
        let iter = self.db.iterator_cf(
            &cf_by_company,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }
        all_keys.reverse();

        let mut transactions = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }
            let tx_id = keys::transaction_id_from_index_key(&key);
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    fn list_transactions_in_range(
        &self,
        company_id: &CompanyId,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_by_company = self.cf(cf::TRANSACTIONS_BY_COMPANY)?;
        let prefix = keys::company_transactions_prefix(company_id);

        let from_ms = u64::try_from(from.timestamp_millis()).unwrap_or(0);
        let to_ms = u64::try_from(to.timestamp_millis()).unwrap_or(0);
        if to_ms <= from_ms {
            return Ok(Vec::new());
        }

        let start = keys::company_transaction_key(company_id, &TransactionId::lower_bound(from_ms));

        let iter = self.db.iterator_cf(
            &cf_by_company,
            IteratorMode::From(&start, rocksdb::Direction::Forward),
        );

        let mut transactions = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let tx_id = keys::transaction_id_from_index_key(&key);
            if tx_id.timestamp_ms() >= to_ms {
                break;
            }
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    fn deduct_credits(
        &self,
        company_id: &CompanyId,
        amount: i64,
        description: String,
        metadata: TransactionMetadata,
    ) -> Result<CreditTransaction> {
        let entry = self.company_locks.entry(*company_id.as_bytes())?;
        let _guard = entry.lock().map_err(|_| lock_poisoned())?;

        let mut company = self.require_company(company_id)?;

        if company.credits < amount {
            return Err(StoreError::InsufficientCredits {
                balance: company.credits,
                required: amount,
            });
        }

        company.credits -= amount;
        company.updated_at = chrono::Utc::now();

        let tx = CreditTransaction::debit(
            *company_id,
            amount,
            company.credits,
            description,
            metadata,
        );

        let mut batch = WriteBatch::default();
        self.batch_company(&mut batch, &company)?;
        self.batch_transaction(&mut batch, &tx)?;
        self.write(batch)?;

        tracing::debug!(
            company_id = %company_id,
            amount,
            balance = company.credits,
            "credits deducted"
        );

        Ok(tx)
    }

    fn add_credits(
        &self,
        company_id: &CompanyId,
        amount: i64,
        description: String,
        metadata: TransactionMetadata,
    ) -> Result<CreditTransaction> {
        let entry = self.company_locks.entry(*company_id.as_bytes())?;
        let _guard = entry.lock().map_err(|_| lock_poisoned())?;

        let mut company = self.require_company(company_id)?;
        company.credits += amount;
        company.updated_at = chrono::Utc::now();

        let tx = CreditTransaction::credit(
            *company_id,
            amount,
            company.credits,
            description,
            metadata,
        );

        let mut batch = WriteBatch::default();
        self.batch_company(&mut batch, &company)?;
        self.batch_transaction(&mut batch, &tx)?;
        self.write(batch)?;

        Ok(tx)
    }

    fn apply_payment(
        &self,
        company_id: &CompanyId,
        amount: i64,
        payment_id: &str,
        amount_cents: i64,
    ) -> Result<CreditTransaction> {
        let entry = self.company_locks.entry(*company_id.as_bytes())?;
        let _guard = entry.lock().map_err(|_| lock_poisoned())?;

        let cf_payments = self.cf(cf::PROCESSED_PAYMENTS)?;
        let already = self
            .db
            .get_cf(&cf_payments, payment_id.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if already {
            return Err(StoreError::DuplicatePayment {
                payment_id: payment_id.to_owned(),
            });
        }

        let mut company = self.require_company(company_id)?;
        company.credits += amount;
        company.updated_at = chrono::Utc::now();

        let tx = CreditTransaction::credit(
            *company_id,
            amount,
            company.credits,
            format!("Credit purchase ({payment_id})"),
            TransactionMetadata::Payment {
                payment_id: payment_id.to_owned(),
                amount_cents,
            },
        );

        let mut batch = WriteBatch::default();
        self.batch_company(&mut batch, &company)?;
        self.batch_transaction(&mut batch, &tx)?;
        batch.put_cf(&cf_payments, payment_id.as_bytes(), []);
        self.write(batch)?;

        Ok(tx)
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    fn put_session(&self, session: &GameSession) -> Result<()> {
        let cf_sessions = self.cf(cf::SESSIONS)?;
        let cf_by_workspace = self.cf(cf::SESSIONS_BY_WORKSPACE)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_sessions,
            keys::session_key(&session.session_id),
            Self::serialize(session)?,
        );
        batch.put_cf(
            &cf_by_workspace,
            keys::workspace_session_key(&session.workspace_id, &session.session_id),
            [],
        );

        self.write(batch)
    }

    fn get_session(&self, session_id: &SessionId) -> Result<Option<GameSession>> {
        self.get_cf_value(cf::SESSIONS, &keys::session_key(session_id))
    }

    fn list_sessions_by_workspace(&self, workspace: &WorkspaceId) -> Result<Vec<GameSession>> {
        let cf_by_workspace = self.cf(cf::SESSIONS_BY_WORKSPACE)?;
        let prefix = workspace.as_bytes().to_vec();

        let iter = self.db.iterator_cf(
            &cf_by_workspace,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut sessions = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let session_bytes = keys::member_id_from_index_key(&key);
            if let Some(session) = self.get_cf_value::<GameSession>(cf::SESSIONS, &session_bytes)? {
                sessions.push(session);
            }
        }

        sessions.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(sessions)
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let session = self
            .get_session(session_id)?
            .ok_or_else(|| StoreError::not_found("session", session_id))?;

        let cf_sessions = self.cf(cf::SESSIONS)?;
        let cf_by_workspace = self.cf(cf::SESSIONS_BY_WORKSPACE)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_sessions, keys::session_key(session_id));
        batch.delete_cf(
            &cf_by_workspace,
            keys::workspace_session_key(&session.workspace_id, session_id),
        );

        self.write(batch)
    }

    fn append_session_turn(
        &self,
        session_id: &SessionId,
        expected_version: Option<i64>,
        turn: SessionTurn,
    ) -> Result<GameSession> {
        let entry = self.session_locks.entry(*session_id.as_bytes())?;
        let _guard = entry.lock().map_err(|_| lock_poisoned())?;

        let mut session = self
            .get_session(session_id)?
            .ok_or_else(|| StoreError::not_found("session", session_id))?;

        if !session.is_active() {
            return Err(StoreError::SessionNotActive {
                status: format!("{:?}", session.status).to_lowercase(),
            });
        }

        if let Some(expected) = expected_version {
            if session.version != expected {
                return Err(StoreError::VersionConflict {
                    expected,
                    actual: session.version,
                });
            }
        }

        if let Some(game_json) = turn.game_json {
            session.apply_game_json(game_json);
        }
        session.record_turn(turn.user_message, turn.assistant_reply, turn.thinking_process);

        let cf_sessions = self.cf(cf::SESSIONS)?;
        self.db
            .put_cf(
                &cf_sessions,
                keys::session_key(session_id),
                Self::serialize(&session)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(session)
    }

    // =========================================================================
    // Game Operations
    // =========================================================================

    fn put_game(&self, game: &GameRecord) -> Result<()> {
        let cf_games = self.cf(cf::GAMES)?;
        let cf_by_company = self.cf(cf::GAMES_BY_COMPANY)?;
        let cf_tokens = self.cf(cf::SHARE_TOKENS)?;
        let cf_domains = self.cf(cf::DOMAINS)?;

        let previous: Option<GameRecord> = self.get_game(&game.id)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_games, keys::game_key(&game.id), Self::serialize(game)?);
        batch.put_cf(
            &cf_by_company,
            keys::company_game_key(&game.company_id, &game.id),
            [],
        );

        // Refresh lookup tables when the token or domain changed.
        let old_token = previous.as_ref().and_then(|g| g.share_token.as_deref());
        if old_token != game.share_token.as_deref() {
            if let Some(old) = old_token {
                batch.delete_cf(&cf_tokens, old.as_bytes());
            }
            if let Some(token) = game.share_token.as_deref() {
                batch.put_cf(&cf_tokens, token.as_bytes(), game.id.as_bytes());
            }
        }

        let old_domain = previous.as_ref().and_then(|g| g.custom_domain.as_deref());
        if old_domain != game.custom_domain.as_deref() {
            if let Some(old) = old_domain {
                batch.delete_cf(&cf_domains, old.as_bytes());
            }
            if let Some(domain) = game.custom_domain.as_deref() {
                batch.put_cf(&cf_domains, domain.as_bytes(), game.id.as_bytes());
            }
        }

        self.write(batch)
    }

    fn get_game(&self, game_id: &GameId) -> Result<Option<GameRecord>> {
        self.get_cf_value(cf::GAMES, &keys::game_key(game_id))
    }

    fn list_games_by_company(&self, company_id: &CompanyId) -> Result<Vec<GameRecord>> {
        let cf_by_company = self.cf(cf::GAMES_BY_COMPANY)?;
        let prefix = company_id.as_bytes().to_vec();

        let iter = self.db.iterator_cf(
            &cf_by_company,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut games = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let game_bytes = keys::member_id_from_index_key(&key);
            if let Some(game) = self.get_cf_value(cf::GAMES, &game_bytes)? {
                games.push(game);
            }
        }

        Ok(games)
    }

    fn get_game_by_share_token(&self, token: &str) -> Result<Option<GameRecord>> {
        let cf_tokens = self.cf(cf::SHARE_TOKENS)?;
        let Some(game_bytes) = self
            .db
            .get_cf(&cf_tokens, token.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        self.get_cf_value(cf::GAMES, &game_bytes)
    }

    fn get_game_by_domain(&self, domain: &str) -> Result<Option<GameRecord>> {
        let cf_domains = self.cf(cf::DOMAINS)?;
        let Some(game_bytes) = self
            .db
            .get_cf(&cf_domains, domain.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        self.get_cf_value(cf::GAMES, &game_bytes)
    }

    fn increment_play_count(&self, game_id: &GameId) -> Result<GameRecord> {
        let entry = self.game_locks.entry(*game_id.as_bytes())?;
        let _guard = entry.lock().map_err(|_| lock_poisoned())?;

        let mut game = self
            .get_game(game_id)?
            .ok_or_else(|| StoreError::not_found("game", game_id))?;
        game.play_count += 1;

        let cf_games = self.cf(cf::GAMES)?;
        self.db
            .put_cf(&cf_games, keys::game_key(game_id), Self::serialize(&game)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(game)
    }

    fn attach_domain(&self, game_id: &GameId, domain: &str) -> Result<GameRecord> {
        let _guard = self.domain_lock.lock().map_err(|_| lock_poisoned())?;

        if let Some(holder) = self.get_game_by_domain(domain)? {
            if holder.id != *game_id {
                return Err(StoreError::DomainTaken {
                    domain: domain.to_owned(),
                });
            }
        }

        let mut game = self
            .get_game(game_id)?
            .ok_or_else(|| StoreError::not_found("game", game_id))?;

        let cf_games = self.cf(cf::GAMES)?;
        let cf_domains = self.cf(cf::DOMAINS)?;

        let mut batch = WriteBatch::default();
        if let Some(old) = game.custom_domain.as_deref() {
            batch.delete_cf(&cf_domains, old.as_bytes());
        }
        game.custom_domain = Some(domain.to_owned());
        game.domain_status = DomainStatus::Pending;
        game.updated_at = chrono::Utc::now();

        batch.put_cf(&cf_games, keys::game_key(game_id), Self::serialize(&game)?);
        batch.put_cf(&cf_domains, domain.as_bytes(), game_id.as_bytes());
        self.write(batch)?;

        Ok(game)
    }

    fn delete_game(&self, game_id: &GameId) -> Result<()> {
        let game = self
            .get_game(game_id)?
            .ok_or_else(|| StoreError::not_found("game", game_id))?;

        let cf_games = self.cf(cf::GAMES)?;
        let cf_by_company = self.cf(cf::GAMES_BY_COMPANY)?;
        let cf_tokens = self.cf(cf::SHARE_TOKENS)?;
        let cf_domains = self.cf(cf::DOMAINS)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_games, keys::game_key(game_id));
        batch.delete_cf(
            &cf_by_company,
            keys::company_game_key(&game.company_id, game_id),
        );
        if let Some(token) = game.share_token.as_deref() {
            batch.delete_cf(&cf_tokens, token.as_bytes());
        }
        if let Some(domain) = game.custom_domain.as_deref() {
            batch.delete_cf(&cf_domains, domain.as_bytes());
        }

        self.write(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_core::SessionStatus;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn seed_company(store: &RocksStore, credits: i64) -> Company {
        let mut company = Company::new("Acme Games".into(), UserId::generate());
        company.credits = credits;
        store.put_company(&company).unwrap();
        company
    }

    #[test]
    fn company_crud_and_owner_index() {
        let (store, _dir) = create_test_store();
        let owner = UserId::generate();

        let company = Company::new("Acme Games".into(), owner);
        store.put_company(&company).unwrap();

        let retrieved = store.get_company(&company.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Acme Games");
        assert_eq!(retrieved.credits, pilot_core::WELCOME_CREDITS);

        let other = Company::new("Side Project".into(), owner);
        store.put_company(&other).unwrap();

        let owned = store.list_companies_by_owner(&owner).unwrap();
        assert_eq!(owned.len(), 2);

        let none = store
            .list_companies_by_owner(&UserId::generate())
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn deduct_appends_ledger_entry() {
        let (store, _dir) = create_test_store();
        let company = seed_company(&store, 1000);

        let tx = store
            .deduct_credits(
                &company.id,
                150,
                "AI Chat Request".into(),
                TransactionMetadata::None,
            )
            .unwrap();
        assert_eq!(tx.balance_after, 850);

        let reloaded = store.get_company(&company.id).unwrap().unwrap();
        assert_eq!(reloaded.credits, 850);

        let history = store
            .list_transactions_by_company(&company.id, 10, 0)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 150);
    }

    #[test]
    fn deduct_fails_closed_on_insufficient_balance() {
        let (store, _dir) = create_test_store();
        let company = seed_company(&store, 5);

        let result = store.deduct_credits(
            &company.id,
            100,
            "AI Chat Request".into(),
            TransactionMetadata::None,
        );
        assert!(matches!(
            result,
            Err(StoreError::InsufficientCredits {
                balance: 5,
                required: 100
            })
        ));

        // Nothing written: balance intact, ledger empty.
        let reloaded = store.get_company(&company.id).unwrap().unwrap();
        assert_eq!(reloaded.credits, 5);
        assert!(store
            .list_transactions_by_company(&company.id, 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn concurrent_deductions_never_double_spend() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let company = seed_company(&store, 100);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let company_id = company.id;
                std::thread::spawn(move || {
                    store.deduct_credits(
                        &company_id,
                        60,
                        "AI Chat Request".into(),
                        TransactionMetadata::None,
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let reloaded = store.get_company(&company.id).unwrap().unwrap();
        assert_eq!(reloaded.credits, 40);
    }

    #[test]
    fn transaction_listing_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let company = seed_company(&store, 1000);

        store
            .deduct_credits(&company.id, 10, "First".into(), TransactionMetadata::None)
            .unwrap();
        // ULIDs are generated at creation time; space them out.
        std::thread::sleep(std::time::Duration::from_millis(2));
        store
            .deduct_credits(&company.id, 20, "Second".into(), TransactionMetadata::None)
            .unwrap();

        let all = store
            .list_transactions_by_company(&company.id, 10, 0)
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].description, "Second");
        assert_eq!(all[1].description, "First");

        let page2 = store
            .list_transactions_by_company(&company.id, 1, 1)
            .unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].description, "First");
    }

    #[test]
    fn range_scan_windows_by_time() {
        let (store, _dir) = create_test_store();
        let company = seed_company(&store, 1000);

        let before = chrono::Utc::now() - chrono::Duration::seconds(1);
        store
            .deduct_credits(&company.id, 10, "Usage".into(), TransactionMetadata::None)
            .unwrap();
        let after = chrono::Utc::now() + chrono::Duration::seconds(1);

        let inside = store
            .list_transactions_in_range(&company.id, before, after)
            .unwrap();
        assert_eq!(inside.len(), 1);

        let past = store
            .list_transactions_in_range(
                &company.id,
                before - chrono::Duration::days(30),
                before,
            )
            .unwrap();
        assert!(past.is_empty());

        let inverted = store
            .list_transactions_in_range(&company.id, after, before)
            .unwrap();
        assert!(inverted.is_empty());
    }

    #[test]
    fn payment_idempotency() {
        let (store, _dir) = create_test_store();
        let company = seed_company(&store, 0);

        let tx = store
            .apply_payment(&company.id, 500, "pay_123", 500)
            .unwrap();
        assert_eq!(tx.balance_after, 500);

        let replay = store.apply_payment(&company.id, 500, "pay_123", 500);
        assert!(matches!(
            replay,
            Err(StoreError::DuplicatePayment { .. })
        ));

        let reloaded = store.get_company(&company.id).unwrap().unwrap();
        assert_eq!(reloaded.credits, 500);
    }

    #[test]
    fn session_turn_bumps_version_and_history() {
        let (store, _dir) = create_test_store();
        let session = GameSession::new(
            SessionId::generate(),
            WorkspaceId::generate(),
            UserId::generate(),
            json!({"properties": {"name": "Platformer"}}),
        );
        store.put_session(&session).unwrap();

        let updated = store
            .append_session_turn(
                &session.session_id,
                Some(1),
                SessionTurn {
                    game_json: Some(json!({"properties": {"name": "Platformer v2"}})),
                    user_message: "rename the game".into(),
                    assistant_reply: "Renamed.".into(),
                    thinking_process: None,
                },
            )
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.conversation_history.len(), 2);

        // A turn without a document change leaves the version alone.
        let updated = store
            .append_session_turn(
                &session.session_id,
                Some(2),
                SessionTurn {
                    game_json: None,
                    user_message: "what did you change?".into(),
                    assistant_reply: "The game title.".into(),
                    thinking_process: None,
                },
            )
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.conversation_history.len(), 4);
    }

    #[test]
    fn stale_version_is_rejected() {
        let (store, _dir) = create_test_store();
        let session = GameSession::new(
            SessionId::generate(),
            WorkspaceId::generate(),
            UserId::generate(),
            json!({}),
        );
        store.put_session(&session).unwrap();

        store
            .append_session_turn(
                &session.session_id,
                Some(1),
                SessionTurn {
                    game_json: Some(json!({"v": 2})),
                    user_message: "a".into(),
                    assistant_reply: "b".into(),
                    thinking_process: None,
                },
            )
            .unwrap();

        let stale = store.append_session_turn(
            &session.session_id,
            Some(1),
            SessionTurn {
                game_json: Some(json!({"v": "stale"})),
                user_message: "c".into(),
                assistant_reply: "d".into(),
                thinking_process: None,
            },
        );
        assert!(matches!(
            stale,
            Err(StoreError::VersionConflict {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn archived_session_rejects_turns() {
        let (store, _dir) = create_test_store();
        let mut session = GameSession::new(
            SessionId::generate(),
            WorkspaceId::generate(),
            UserId::generate(),
            json!({}),
        );
        session.archive();
        store.put_session(&session).unwrap();
        assert_eq!(session.status, SessionStatus::Archived);

        let result = store.append_session_turn(
            &session.session_id,
            None,
            SessionTurn {
                game_json: None,
                user_message: "a".into(),
                assistant_reply: "b".into(),
                thinking_process: None,
            },
        );
        assert!(matches!(result, Err(StoreError::SessionNotActive { .. })));
    }

    #[test]
    fn workspace_listing_newest_first() {
        let (store, _dir) = create_test_store();
        let workspace = WorkspaceId::generate();

        let first = GameSession::new(
            SessionId::generate(),
            workspace,
            UserId::generate(),
            json!({}),
        );
        store.put_session(&first).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = GameSession::new(
            SessionId::generate(),
            workspace,
            UserId::generate(),
            json!({}),
        );
        store.put_session(&second).unwrap();

        let sessions = store.list_sessions_by_workspace(&workspace).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, second.session_id);

        store.delete_session(&first.session_id).unwrap();
        let sessions = store.list_sessions_by_workspace(&workspace).unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn concurrent_plays_all_count() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let company = seed_company(&store, 0);

        let game = GameRecord::new(company.id, WorkspaceId::generate(), "Coin Chase".into());
        store.put_game(&game).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let game_id = game.id;
                std::thread::spawn(move || store.increment_play_count(&game_id).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reloaded = store.get_game(&game.id).unwrap().unwrap();
        assert_eq!(reloaded.play_count, 8);
    }

    #[test]
    fn share_token_and_domain_lookups() {
        let (store, _dir) = create_test_store();
        let company = seed_company(&store, 0);

        let mut game = GameRecord::new(company.id, WorkspaceId::generate(), "Coin Chase".into());
        game.share_token = Some("tok_abc123".into());
        store.put_game(&game).unwrap();

        let by_token = store.get_game_by_share_token("tok_abc123").unwrap().unwrap();
        assert_eq!(by_token.id, game.id);

        let attached = store.attach_domain(&game.id, "my-game.com").unwrap();
        assert_eq!(attached.domain_status, DomainStatus::Pending);

        let by_domain = store.get_game_by_domain("my-game.com").unwrap().unwrap();
        assert_eq!(by_domain.id, game.id);

        // Another game cannot take the same domain.
        let rival = GameRecord::new(company.id, WorkspaceId::generate(), "Rival".into());
        store.put_game(&rival).unwrap();
        let taken = store.attach_domain(&rival.id, "my-game.com");
        assert!(matches!(taken, Err(StoreError::DomainTaken { .. })));

        // Deleting the game clears the lookup tables.
        store.delete_game(&game.id).unwrap();
        assert!(store.get_game_by_share_token("tok_abc123").unwrap().is_none());
        assert!(store.get_game_by_domain("my-game.com").unwrap().is_none());
    }
}
