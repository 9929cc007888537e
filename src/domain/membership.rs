use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog tier. Reference data; reconciliation never writes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MembershipPlan {
    pub id: Uuid,
    pub plan_type: String,
    pub name: String,
    pub monthly_price_cents: i64,
    pub member_hourly_rate_cents: i64,
    pub included_visit_minutes: i64,
    /// Included minutes only apply to remote visits.
    pub included_minutes_remote_only: bool,
    pub max_covered_people: i64,
    pub is_active: bool,
}

impl MembershipPlan {
    pub fn tier(&self) -> Option<PlanTier> {
        PlanTier::from_str(&self.plan_type)
    }
}

/// Plan types the pricing rules know about. Anything else prices as a
/// non-member visit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Premium,
    Family,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Premium => "premium",
            PlanTier::Family => "family",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "basic" => Some(PlanTier::Basic),
            "premium" => Some(PlanTier::Premium),
            "family" => Some(PlanTier::Family),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: MembershipStatus,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub covered_user_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Active,
    Cancelled,
    Expired,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Active => "active",
            MembershipStatus::Cancelled => "cancelled",
            MembershipStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MembershipStatus::Pending),
            "active" => Some(MembershipStatus::Active),
            "cancelled" => Some(MembershipStatus::Cancelled),
            "expired" => Some(MembershipStatus::Expired),
            _ => None,
        }
    }

    /// Cancelled and expired memberships are never revived; a returning
    /// member gets a new membership row.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MembershipStatus::Cancelled | MembershipStatus::Expired)
    }

    pub fn can_transition_to(&self, next: MembershipStatus) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Cancelled) | (Active, Cancelled) | (Active, Expired)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMembership {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: MembershipStatus,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub covered_user_ids: Vec<Uuid>,
}
