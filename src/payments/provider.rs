//! The slice of the payment processor this crate consumes.
//!
//! Reconciliation only ever reads provider state. The types here are
//! provider-neutral snapshots so the services can be exercised against
//! [`FakeStripeGateway`](super::FakeStripeGateway) as well as Stripe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub const META_APPOINTMENT_ID: &str = "appointment_id";
pub const META_BASE_AMOUNT: &str = "base_amount";
pub const META_TRAVEL_FEE: &str = "travel_fee";
pub const META_TAX_AMOUNT: &str = "tax_amount";
pub const META_USER_ID: &str = "user_id";
pub const META_PLAN_ID: &str = "membership_plan_id";

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn retrieve_charge(&self, charge_id: &str) -> Result<ProviderCharge>;
    /// Most recent charges first, optionally scoped to one customer.
    async fn list_charges(&self, customer_id: Option<&str>, limit: u64) -> Result<Vec<ProviderCharge>>;
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription>;
    /// Retrieves an invoice with its payment intent expanded.
    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<ProviderInvoice>;
}

/// Stands in for the processor when Stripe is switched off. Every lookup
/// fails, so reconciliation reports the processor as unavailable.
pub struct UnconfiguredProvider;

#[async_trait]
impl PaymentProvider for UnconfiguredProvider {
    async fn retrieve_charge(&self, _charge_id: &str) -> Result<ProviderCharge> {
        Err(unconfigured())
    }

    async fn list_charges(&self, _customer_id: Option<&str>, _limit: u64) -> Result<Vec<ProviderCharge>> {
        Err(unconfigured())
    }

    async fn retrieve_subscription(&self, _subscription_id: &str) -> Result<ProviderSubscription> {
        Err(unconfigured())
    }

    async fn retrieve_invoice(&self, _invoice_id: &str) -> Result<ProviderInvoice> {
        Err(unconfigured())
    }
}

fn unconfigured() -> AppError {
    AppError::External("Payment processing is not configured".to_string())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChargeState {
    Succeeded,
    Pending,
    Failed,
}

impl ChargeState {
    pub fn from_str(s: &str) -> Self {
        match s {
            "succeeded" => ChargeState::Succeeded,
            "pending" => ChargeState::Pending,
            _ => ChargeState::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderCharge {
    pub id: String,
    pub status: ChargeState,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_id: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Unix seconds.
    pub created: i64,
}

impl ProviderCharge {
    pub fn appointment_id(&self) -> Option<Uuid> {
        self.metadata
            .get(META_APPOINTMENT_ID)
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
    }

    /// A succeeded charge whose metadata points at `appointment_id`.
    pub fn settles(&self, appointment_id: Uuid) -> bool {
        self.status == ChargeState::Succeeded && self.appointment_id() == Some(appointment_id)
    }

    pub fn metadata_cents(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(|v| parse_dollars(v))
    }
}

/// Parses a dollar amount as written into charge metadata ("140", "12.5",
/// "$10.64") into cents.
pub fn parse_dollars(raw: &str) -> Option<i64> {
    let trimmed = raw.trim().trim_start_matches('$');
    if trimmed.is_empty() {
        return None;
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let dollars: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut digits = fraction.chars();
    let tens = digits.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
    let ones = digits.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
    let round_up = digits.next().and_then(|c| c.to_digit(10)).map_or(false, |d| d >= 5);

    Some(dollars * 100 + tens * 10 + ones + round_up as i64)
}

/// Subscription lifecycle states as the processor reports them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Active,
    Trialing,
    Incomplete,
    IncompleteExpired,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
}

impl SubscriptionState {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionState::Active),
            "trialing" => Some(SubscriptionState::Trialing),
            "incomplete" => Some(SubscriptionState::Incomplete),
            "incomplete_expired" => Some(SubscriptionState::IncompleteExpired),
            "past_due" => Some(SubscriptionState::PastDue),
            "canceled" => Some(SubscriptionState::Canceled),
            "unpaid" => Some(SubscriptionState::Unpaid),
            "paused" => Some(SubscriptionState::Paused),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Active => "active",
            SubscriptionState::Trialing => "trialing",
            SubscriptionState::Incomplete => "incomplete",
            SubscriptionState::IncompleteExpired => "incomplete_expired",
            SubscriptionState::PastDue => "past_due",
            SubscriptionState::Canceled => "canceled",
            SubscriptionState::Unpaid => "unpaid",
            SubscriptionState::Paused => "paused",
        }
    }

    /// States a local membership may be created or updated from.
    pub fn is_syncable(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Active
                | SubscriptionState::Trialing
                | SubscriptionState::Incomplete
                | SubscriptionState::PastDue
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: SubscriptionState,
    pub customer_id: Option<String>,
    pub metadata: HashMap<String, String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub latest_invoice_id: Option<String>,
}

impl ProviderSubscription {
    pub fn owner_id(&self) -> Option<Uuid> {
        self.metadata.get(META_USER_ID).and_then(|v| Uuid::parse_str(v.trim()).ok())
    }

    pub fn plan_id(&self) -> Option<Uuid> {
        self.metadata.get(META_PLAN_ID).and_then(|v| Uuid::parse_str(v.trim()).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderInvoice {
    pub id: String,
    pub status: Option<String>,
    pub paid: bool,
    pub payment_intent_status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoicePaymentState {
    Paid,
    Unpaid,
    Unknown,
}

impl ProviderInvoice {
    pub fn payment_state(&self) -> InvoicePaymentState {
        if self.paid || self.status.as_deref() == Some("paid") {
            return InvoicePaymentState::Paid;
        }
        match self.payment_intent_status.as_deref() {
            Some("succeeded") => InvoicePaymentState::Paid,
            Some(_) => InvoicePaymentState::Unpaid,
            None => InvoicePaymentState::Unknown,
        }
    }
}

/// Webhook notifications this crate acts on.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    ChargeSucceeded(ProviderCharge),
    SubscriptionChanged(ProviderSubscription),
    InvoicePaid { subscription_id: Option<String> },
    Ignored(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dollars() {
        assert_eq!(parse_dollars("140"), Some(14000));
        assert_eq!(parse_dollars("140.00"), Some(14000));
        assert_eq!(parse_dollars("12.5"), Some(1250));
        assert_eq!(parse_dollars("$10.64"), Some(1064));
        assert_eq!(parse_dollars(".99"), Some(99));
        assert_eq!(parse_dollars("6.095"), Some(610));
        assert_eq!(parse_dollars(""), None);
        assert_eq!(parse_dollars("-3"), None);
        assert_eq!(parse_dollars("ten"), None);
    }

    #[test]
    fn test_charge_settles_only_matching_success() {
        let appointment_id = Uuid::new_v4();
        let mut charge = ProviderCharge {
            id: "ch_1".to_string(),
            status: ChargeState::Succeeded,
            amount_cents: 16264,
            currency: "usd".to_string(),
            customer_id: None,
            metadata: HashMap::from([(META_APPOINTMENT_ID.to_string(), appointment_id.to_string())]),
            created: 0,
        };
        assert!(charge.settles(appointment_id));
        assert!(!charge.settles(Uuid::new_v4()));

        charge.status = ChargeState::Pending;
        assert!(!charge.settles(appointment_id));
    }

    #[test]
    fn test_invoice_payment_state() {
        let mut invoice = ProviderInvoice {
            id: "in_1".to_string(),
            status: Some("open".to_string()),
            paid: false,
            payment_intent_status: None,
        };
        assert_eq!(invoice.payment_state(), InvoicePaymentState::Unknown);

        invoice.payment_intent_status = Some("requires_payment_method".to_string());
        assert_eq!(invoice.payment_state(), InvoicePaymentState::Unpaid);

        invoice.payment_intent_status = Some("succeeded".to_string());
        assert_eq!(invoice.payment_state(), InvoicePaymentState::Paid);

        invoice.payment_intent_status = None;
        invoice.status = Some("paid".to_string());
        assert_eq!(invoice.payment_state(), InvoicePaymentState::Paid);
    }

    #[test]
    fn test_syncable_states() {
        for state in ["active", "trialing", "incomplete", "past_due"] {
            assert!(SubscriptionState::from_str(state).unwrap().is_syncable());
        }
        for state in ["canceled", "unpaid", "incomplete_expired", "paused"] {
            assert!(!SubscriptionState::from_str(state).unwrap().is_syncable());
        }
    }
}
