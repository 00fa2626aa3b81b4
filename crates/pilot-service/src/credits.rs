//! Credit metering on top of the store.
//!
//! All balance movement goes through here so the ledger invariants live in
//! one place: deductions fail closed, every movement gets a transaction, and
//! usage queries are time-window scans over the ledger.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

use pilot_core::{
    engine_surcharge, CompanyId, CreditTransaction, EngineType, TransactionMetadata,
    TransactionType, UserId,
};
use pilot_store::{Result as StoreResult, Store, StoreError};

/// Fraction of the monthly limit (in percent) at which a company counts as
/// approaching its cap.
const APPROACHING_LIMIT_PERCENT: i64 = 90;

/// Balance summary returned by the credits API.
#[derive(Debug, Serialize)]
pub struct BalanceSummary {
    /// Current balance.
    pub credits: i64,
    /// Plan slug.
    pub plan: String,
    /// Effective monthly cap.
    pub monthly_limit: i64,
    /// Credits consumed since the start of the calendar month.
    pub current_month_usage: i64,
    /// Credits left under the monthly cap.
    pub remaining_monthly_allowance: i64,
    /// Whether usage is at 90% of the cap or beyond.
    pub is_approaching_limit: bool,
    /// Timestamp of the newest ledger entry, if any.
    pub last_transaction_at: Option<DateTime<Utc>>,
}

/// Daily usage bucket.
#[derive(Debug, Serialize)]
pub struct DailyUsage {
    /// Calendar date (UTC).
    pub date: String,
    /// Credits consumed.
    pub credits_used: i64,
    /// Number of debit transactions.
    pub requests: u64,
}

/// Usage analytics over a time window.
#[derive(Debug, Serialize)]
pub struct UsageAnalytics {
    /// Window start (inclusive).
    pub from: DateTime<Utc>,
    /// Window end (exclusive).
    pub to: DateTime<Utc>,
    /// Total credits consumed in the window.
    pub total_debits: i64,
    /// Total credits added in the window.
    pub total_credits: i64,
    /// Debits minus credits.
    pub net_usage: i64,
    /// Number of ledger entries in the window.
    pub transaction_count: u64,
    /// Per-day buckets, oldest first. Days without usage are omitted.
    pub daily: Vec<DailyUsage>,
}

/// Credit metering operations for a store.
pub struct CreditManager {
    store: Arc<dyn Store>,
}

impl CreditManager {
    /// Create a manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Whether the company's balance covers an estimated cost.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the company doesn't exist.
    pub fn can_afford(&self, company_id: &CompanyId, estimated: i64) -> StoreResult<bool> {
        let company = self
            .store
            .get_company(company_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "company",
                id: company_id.to_string(),
            })?;
        Ok(company.can_afford(estimated))
    }

    /// Deduct the actual cost of an AI call, recording provider and token
    /// usage in the ledger entry.
    ///
    /// # Errors
    ///
    /// Fails closed on `InsufficientCredits`; the balance is untouched.
    pub fn deduct_ai_usage(
        &self,
        company_id: &CompanyId,
        user_id: UserId,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> StoreResult<CreditTransaction> {
        let amount = i64::try_from(input_tokens + output_tokens).unwrap_or(i64::MAX);
        self.store.deduct_credits(
            company_id,
            amount.max(1),
            format!("AI Chat Request ({provider} {model})"),
            TransactionMetadata::AiUsage {
                provider: provider.to_owned(),
                model: model.to_owned(),
                user_id,
                input_tokens,
                output_tokens,
            },
        )
    }

    /// Deduct an engine operation: base token cost plus the engine's MCP
    /// surcharge in one ledger entry.
    ///
    /// # Errors
    ///
    /// Fails closed on `InsufficientCredits`.
    pub fn deduct_engine_usage(
        &self,
        company_id: &CompanyId,
        engine: EngineType,
        base_tokens: i64,
        action_count: u32,
    ) -> StoreResult<CreditTransaction> {
        let surcharge = engine_surcharge(engine, action_count);
        let total = (base_tokens + surcharge).max(1);
        self.store.deduct_credits(
            company_id,
            total,
            format!("{} request ({action_count} actions)", engine.as_str()),
            TransactionMetadata::EngineUsage {
                engine,
                base_tokens,
                surcharge,
            },
        )
    }

    /// Grant credits with an admin audit trail.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the company doesn't exist.
    pub fn add_credits(
        &self,
        company_id: &CompanyId,
        amount: i64,
        reason: String,
        admin_id: String,
    ) -> StoreResult<CreditTransaction> {
        self.store.add_credits(
            company_id,
            amount,
            reason,
            TransactionMetadata::Adjustment { admin_id },
        )
    }

    /// Credits consumed since the start of the current calendar month.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger scan fails.
    pub fn current_month_usage(&self, company_id: &CompanyId) -> StoreResult<i64> {
        let now = Utc::now();
        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);

        let transactions = self
            .store
            .list_transactions_in_range(company_id, month_start, now)?;

        Ok(transactions
            .iter()
            .filter(|tx| tx.transaction_type == TransactionType::Debit)
            .map(|tx| tx.amount)
            .sum())
    }

    /// Whether month-to-date usage is at or beyond 90% of the monthly cap.
    /// Companies without a cap never approach it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the company doesn't exist.
    pub fn is_approaching_limit(&self, company_id: &CompanyId) -> StoreResult<bool> {
        let company = self
            .store
            .get_company(company_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "company",
                id: company_id.to_string(),
            })?;

        let limit = company.effective_monthly_limit();
        if limit <= 0 {
            return Ok(false);
        }

        let usage = self.current_month_usage(company_id)?;
        Ok(usage * 100 >= limit * APPROACHING_LIMIT_PERCENT)
    }

    /// Balance, plan, and month-to-date usage in one response.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the company doesn't exist.
    pub fn balance_summary(&self, company_id: &CompanyId) -> StoreResult<BalanceSummary> {
        let company = self
            .store
            .get_company(company_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "company",
                id: company_id.to_string(),
            })?;

        let current_month_usage = self.current_month_usage(company_id)?;
        let limit = company.effective_monthly_limit();
        let last_transaction_at = self
            .store
            .list_transactions_by_company(company_id, 1, 0)?
            .first()
            .map(|tx| tx.created_at);

        Ok(BalanceSummary {
            credits: company.credits,
            plan: company.plan.slug().to_owned(),
            monthly_limit: limit,
            current_month_usage,
            remaining_monthly_allowance: (limit - current_month_usage).max(0),
            is_approaching_limit: limit > 0
                && current_month_usage * 100 >= limit * APPROACHING_LIMIT_PERCENT,
            last_transaction_at,
        })
    }

    /// Usage analytics with daily buckets over `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger scan fails.
    pub fn usage_analytics(
        &self,
        company_id: &CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<UsageAnalytics> {
        let transactions = self.store.list_transactions_in_range(company_id, from, to)?;

        let mut daily: Vec<DailyUsage> = Vec::new();
        let mut total_debits = 0;
        let mut total_credits = 0;

        for tx in &transactions {
            match tx.transaction_type {
                TransactionType::Debit => {
                    total_debits += tx.amount;
                    let date = tx.created_at.date_naive().to_string();
                    match daily.last_mut() {
                        Some(bucket) if bucket.date == date => {
                            bucket.credits_used += tx.amount;
                            bucket.requests += 1;
                        }
                        _ => daily.push(DailyUsage {
                            date,
                            credits_used: tx.amount,
                            requests: 1,
                        }),
                    }
                }
                TransactionType::Credit => total_credits += tx.amount,
            }
        }

        Ok(UsageAnalytics {
            from,
            to,
            total_debits,
            total_credits,
            net_usage: total_debits - total_credits,
            transaction_count: transactions.len() as u64,
            daily,
        })
    }

    /// Newest ledger entries, paginated.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger scan fails.
    pub fn recent_transactions(
        &self,
        company_id: &CompanyId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<CreditTransaction>> {
        self.store
            .list_transactions_by_company(company_id, limit.clamp(1, 100), offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_core::{Company, Plan};
    use pilot_store::RocksStore;
    use tempfile::TempDir;

    fn manager() -> (CreditManager, Arc<dyn Store>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(dir.path()).unwrap());
        (CreditManager::new(Arc::clone(&store)), store, dir)
    }

    fn seed(store: &Arc<dyn Store>, credits: i64) -> Company {
        let mut company = Company::new("Acme".into(), UserId::generate());
        company.credits = credits;
        store.put_company(&company).unwrap();
        company
    }

    #[test]
    fn ai_usage_deducts_total_tokens() {
        let (manager, store, _dir) = manager();
        let company = seed(&store, 2000);

        let tx = manager
            .deduct_ai_usage(
                &company.id,
                UserId::generate(),
                "anthropic",
                "claude-sonnet",
                1000,
                250,
            )
            .unwrap();
        assert_eq!(tx.amount, 1250);
        assert_eq!(tx.balance_after, 750);
        assert!(matches!(tx.metadata, TransactionMetadata::AiUsage { .. }));
    }

    #[test]
    fn engine_usage_includes_surcharge() {
        let (manager, store, _dir) = manager();
        let company = seed(&store, 1000);

        // 100 base + ceil(15/10) = 2 surcharge
        let tx = manager
            .deduct_engine_usage(&company.id, EngineType::PlayCanvas, 100, 15)
            .unwrap();
        assert_eq!(tx.amount, 102);

        let tx = manager
            .deduct_engine_usage(&company.id, EngineType::GDevelop, 100, 15)
            .unwrap();
        assert_eq!(tx.amount, 100);
    }

    #[test]
    fn deduction_fails_closed() {
        let (manager, store, _dir) = manager();
        let company = seed(&store, 10);

        let result =
            manager.deduct_ai_usage(&company.id, UserId::generate(), "anthropic", "m", 100, 100);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientCredits { balance: 10, .. })
        ));
        assert_eq!(
            store.get_company(&company.id).unwrap().unwrap().credits,
            10
        );
    }

    #[test]
    fn approaching_limit_at_ninety_percent() {
        let (manager, store, _dir) = manager();
        let mut company = seed(&store, 100_000);
        company.monthly_credit_limit = 1000;
        store.put_company(&company).unwrap();

        assert!(!manager.is_approaching_limit(&company.id).unwrap());

        manager
            .deduct_ai_usage(&company.id, UserId::generate(), "anthropic", "m", 800, 99)
            .unwrap();
        assert!(!manager.is_approaching_limit(&company.id).unwrap());

        manager
            .deduct_ai_usage(&company.id, UserId::generate(), "anthropic", "m", 1, 0)
            .unwrap();
        // 900 of 1000 used.
        assert!(manager.is_approaching_limit(&company.id).unwrap());
    }

    #[test]
    fn balance_summary_reflects_usage() {
        let (manager, store, _dir) = manager();
        let company = seed(&store, 5000);

        manager
            .deduct_ai_usage(&company.id, UserId::generate(), "anthropic", "m", 100, 50)
            .unwrap();

        let summary = manager.balance_summary(&company.id).unwrap();
        assert_eq!(summary.credits, 4850);
        assert_eq!(summary.plan, Plan::Starter.slug());
        assert_eq!(summary.current_month_usage, 150);
        assert!(summary.last_transaction_at.is_some());
    }

    #[test]
    fn analytics_buckets_by_day() {
        let (manager, store, _dir) = manager();
        let company = seed(&store, 5000);

        manager
            .deduct_ai_usage(&company.id, UserId::generate(), "anthropic", "m", 60, 40)
            .unwrap();
        manager
            .add_credits(&company.id, 500, "Grant".into(), "ops".into())
            .unwrap();

        let now = Utc::now();
        let analytics = manager
            .usage_analytics(&company.id, now - chrono::Duration::days(7), now)
            .unwrap();
        assert_eq!(analytics.total_debits, 100);
        assert_eq!(analytics.total_credits, 500);
        assert_eq!(analytics.net_usage, -400);
        assert_eq!(analytics.transaction_count, 2);
        assert_eq!(analytics.daily.len(), 1);
        assert_eq!(analytics.daily[0].requests, 1);
    }
}
