use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus, PayoutBreakdown},
    error::{AppError, Result},
    repository::{is_unique_violation, Insert, PaymentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    appointment_id: String,
    requester_id: String,
    provider_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    stripe_charge_id: Option<String>,
    stripe_customer_id: Option<String>,
    hours_worked: f64,
    mileage: f64,
    specialist_pay_cents: i64,
    mileage_pay_cents: i64,
    company_revenue_cents: i64,
    tax_cents: i64,
    base_service_cents: i64,
    travel_fee_cents: i64,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const PAYMENT_COLUMNS: &str = r#"
    id, appointment_id, requester_id, provider_id, amount_cents, currency,
    status, stripe_charge_id, stripe_customer_id, hours_worked, mileage,
    specialist_pay_cents, mileage_pay_cents, company_revenue_cents,
    tax_cents, base_service_cents, travel_fee_cents,
    paid_at, created_at, updated_at
"#;

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        let parse_id = |s: &str| Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()));

        Ok(Payment {
            id: parse_id(&row.id)?,
            appointment_id: parse_id(&row.appointment_id)?,
            requester_id: parse_id(&row.requester_id)?,
            provider_id: parse_id(&row.provider_id)?,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: PaymentStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
            stripe_charge_id: row.stripe_charge_id,
            stripe_customer_id: row.stripe_customer_id,
            payout: PayoutBreakdown {
                hours_worked: row.hours_worked,
                mileage: row.mileage,
                specialist_pay_cents: row.specialist_pay_cents,
                mileage_pay_cents: row.mileage_pay_cents,
                company_revenue_cents: row.company_revenue_cents,
                tax_cents: row.tax_cents,
                base_service_cents: row.base_service_cents,
                travel_fee_cents: row.travel_fee_cents,
            },
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn fetch_where(&self, clause: &str, value: String) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE {} ORDER BY created_at DESC",
            PAYMENT_COLUMNS, clause
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_payment)
            .collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.fetch_where("id = ?", id.to_string()).await?.into_iter().next())
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Insert<Payment>> {
        let paid_at_naive = payment.paid_at.map(|dt| dt.naive_utc());
        let now = Utc::now().naive_utc();
        let sql = format!(
            "INSERT INTO payments ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PAYMENT_COLUMNS
        );

        let inserted = sqlx::query(&sql)
            .bind(payment.id.to_string())
            .bind(payment.appointment_id.to_string())
            .bind(payment.requester_id.to_string())
            .bind(payment.provider_id.to_string())
            .bind(payment.amount_cents)
            .bind(&payment.currency)
            .bind(payment.status.as_str())
            .bind(&payment.stripe_charge_id)
            .bind(&payment.stripe_customer_id)
            .bind(payment.payout.hours_worked)
            .bind(payment.payout.mileage)
            .bind(payment.payout.specialist_pay_cents)
            .bind(payment.payout.mileage_pay_cents)
            .bind(payment.payout.company_revenue_cents)
            .bind(payment.payout.tax_cents)
            .bind(payment.payout.base_service_cents)
            .bind(payment.payout.travel_fee_cents)
            .bind(paid_at_naive)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(Insert::AlreadyExists),
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        let created = self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })?;

        Ok(Insert::Created(created))
    }

    async fn find_completed_by_appointment(&self, appointment_id: Uuid) -> Result<Option<Payment>> {
        let payments = self
            .fetch_where("appointment_id = ? AND status = 'completed'", appointment_id.to_string())
            .await?;

        Ok(payments.into_iter().next())
    }

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<Payment>> {
        self.fetch_where("appointment_id = ?", appointment_id.to_string()).await
    }
}
