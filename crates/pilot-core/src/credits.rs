//! Credit ledger types.
//!
//! Every balance change appends one immutable `CreditTransaction`. Amounts
//! are always positive; the direction is carried by `TransactionType`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cost::EngineType;
use crate::{CompanyId, TransactionId, UserId};

/// An immutable record of a single credit movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Time-ordered transaction identifier.
    pub id: TransactionId,

    /// The company whose balance changed.
    pub company_id: CompanyId,

    /// Direction of the movement.
    pub transaction_type: TransactionType,

    /// Amount moved. Always positive.
    pub amount: i64,

    /// Balance after this transaction was applied.
    pub balance_after: i64,

    /// Human-readable description.
    pub description: String,

    /// Structured context for the movement.
    pub metadata: TransactionMetadata,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a debit (usage) transaction. The amount is normalized to be
    /// positive regardless of the caller's sign.
    #[must_use]
    pub fn debit(
        company_id: CompanyId,
        amount: i64,
        balance_after: i64,
        description: String,
        metadata: TransactionMetadata,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            company_id,
            transaction_type: TransactionType::Debit,
            amount: amount.abs(),
            balance_after,
            description,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Create a credit (grant/purchase/refund) transaction.
    #[must_use]
    pub fn credit(
        company_id: CompanyId,
        amount: i64,
        balance_after: i64,
        description: String,
        metadata: TransactionMetadata,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            company_id,
            transaction_type: TransactionType::Credit,
            amount: amount.abs(),
            balance_after,
            description,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Signed balance delta this transaction represents.
    #[must_use]
    pub const fn signed_amount(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Credit => self.amount,
            TransactionType::Debit => -self.amount,
        }
    }
}

/// Direction of a credit movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits added (purchase, plan grant, refund, admin adjustment).
    Credit,

    /// Credits consumed by usage.
    Debit,
}

impl TransactionType {
    /// Stable string form used in API responses.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

/// Structured transaction context.
///
/// Known producers get typed variants; anything else goes through `Opaque`
/// so the ledger never rejects a write for lack of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransactionMetadata {
    /// An AI chat/assist call.
    AiUsage {
        /// Provider name (e.g. "anthropic").
        provider: String,
        /// Model name.
        model: String,
        /// The user who made the request.
        user_id: UserId,
        /// Prompt tokens consumed.
        input_tokens: u64,
        /// Completion tokens consumed.
        output_tokens: u64,
    },

    /// An engine-specific operation carrying an MCP surcharge.
    EngineUsage {
        /// Engine backend.
        engine: EngineType,
        /// Token cost before the surcharge.
        base_tokens: i64,
        /// Surcharge credits added on top.
        surcharge: i64,
    },

    /// A completed payment.
    Payment {
        /// Payment provider's reference.
        payment_id: String,
        /// Amount paid in cents.
        amount_cents: i64,
    },

    /// Manual adjustment by an operator.
    Adjustment {
        /// Operator identifier for the audit trail.
        admin_id: String,
    },

    /// Context from a producer without a typed schema.
    Opaque(serde_json::Value),

    /// No context recorded.
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_amount_always_positive() {
        let tx = CreditTransaction::debit(
            CompanyId::generate(),
            -150,
            850,
            "AI Chat Request".into(),
            TransactionMetadata::None,
        );
        assert_eq!(tx.amount, 150);
        assert_eq!(tx.transaction_type, TransactionType::Debit);
        assert_eq!(tx.signed_amount(), -150);
    }

    #[test]
    fn credit_signed_amount() {
        let tx = CreditTransaction::credit(
            CompanyId::generate(),
            500,
            1500,
            "Credit purchase".into(),
            TransactionMetadata::Payment {
                payment_id: "pay_123".into(),
                amount_cents: 500,
            },
        );
        assert_eq!(tx.signed_amount(), 500);
        assert_eq!(tx.balance_after, 1500);
    }

    #[test]
    fn metadata_serializes_tagged() {
        let metadata = TransactionMetadata::AiUsage {
            provider: "anthropic".into(),
            model: "claude-sonnet".into(),
            user_id: UserId::generate(),
            input_tokens: 1000,
            output_tokens: 250,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["kind"], "ai_usage");
        assert_eq!(json["input_tokens"], 1000);

        let back: TransactionMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }
}
