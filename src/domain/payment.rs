use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A captured charge for one appointment, with its payout split.
///
/// Rows are written once by payment reconciliation and are only changed
/// afterwards by the refund flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub requester_id: Uuid,
    pub provider_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub stripe_charge_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub payout: PayoutBreakdown,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a captured amount divides between the specialist, tax and the company.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutBreakdown {
    pub hours_worked: f64,
    pub mileage: f64,
    pub specialist_pay_cents: i64,
    pub mileage_pay_cents: i64,
    pub company_revenue_cents: i64,
    pub tax_cents: i64,
    pub base_service_cents: i64,
    pub travel_fee_cents: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "refunded" => Some(PaymentStatus::Refunded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}
