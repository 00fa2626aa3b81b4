//! Company (billing tenant) types and the subscription plan catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CompanyId, UserId};

/// Credits granted to a freshly created company.
pub const WELCOME_CREDITS: i64 = 100;

/// Starter plan monthly credit allowance.
pub const STARTER_PLAN_CREDITS: i64 = 1_000;

/// Pro plan monthly credit allowance.
pub const PRO_PLAN_CREDITS: i64 = 5_000;

/// Studio plan monthly credit allowance.
pub const STUDIO_PLAN_CREDITS: i64 = 20_000;

/// Pro plan monthly price in cents ($29).
pub const PRO_PLAN_PRICE_CENTS: i64 = 2_900;

/// Studio plan monthly price in cents ($99).
pub const STUDIO_PLAN_PRICE_CENTS: i64 = 9_900;

/// A billing tenant owning a credit balance and workspaces.
///
/// The balance is only ever mutated through the store's atomic compound
/// operations; every change is paired with a ledger transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    /// Unique company identifier.
    pub id: CompanyId,

    /// Display name.
    pub name: String,

    /// The user who created the company.
    pub owner_user_id: UserId,

    /// Current credit balance. Never negative at rest.
    pub credits: i64,

    /// Subscription plan.
    pub plan: Plan,

    /// Explicit monthly usage cap. Zero means "derive from the plan".
    pub monthly_credit_limit: i64,

    /// When the company was created.
    pub created_at: DateTime<Utc>,

    /// When the company was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Create a new company on the starter plan with the welcome grant.
    #[must_use]
    pub fn new(name: String, owner_user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: CompanyId::generate(),
            name,
            owner_user_id,
            credits: WELCOME_CREDITS,
            plan: Plan::Starter,
            monthly_credit_limit: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the balance covers an estimated cost.
    #[must_use]
    pub fn can_afford(&self, estimated_cost: i64) -> bool {
        self.credits >= estimated_cost
    }

    /// The monthly cap that applies to this company: the explicit limit when
    /// set, otherwise the plan allowance.
    #[must_use]
    pub fn effective_monthly_limit(&self) -> i64 {
        if self.monthly_credit_limit > 0 {
            self.monthly_credit_limit
        } else {
            self.plan.monthly_credits()
        }
    }
}

/// Subscription plan catalog. Slugs are the stable join key used across the
/// API and in transaction metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Entry tier.
    Starter,

    /// Individual developers.
    Pro,

    /// Teams.
    Studio,

    /// Custom pricing and limits, negotiated per contract.
    Enterprise,
}

impl Plan {
    /// Stable slug for the plan.
    #[must_use]
    pub const fn slug(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Studio => "studio",
            Self::Enterprise => "enterprise",
        }
    }

    /// Monthly credit allowance.
    #[must_use]
    pub const fn monthly_credits(&self) -> i64 {
        match self {
            Self::Starter => STARTER_PLAN_CREDITS,
            Self::Pro => PRO_PLAN_CREDITS,
            Self::Studio => STUDIO_PLAN_CREDITS,
            Self::Enterprise => 0, // custom, set via monthly_credit_limit
        }
    }

    /// Monthly price in cents.
    #[must_use]
    pub const fn monthly_price_cents(&self) -> i64 {
        match self {
            Self::Starter => 0,
            Self::Pro => PRO_PLAN_PRICE_CENTS,
            Self::Studio => STUDIO_PLAN_PRICE_CENTS,
            Self::Enterprise => 0, // custom
        }
    }

    /// Parse a plan from its slug.
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "starter" => Some(Self::Starter),
            "pro" => Some(Self::Pro),
            "studio" => Some(Self::Studio),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}
