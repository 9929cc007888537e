use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::{PaymentProvider, ProviderCharge, META_BASE_AMOUNT, META_TAX_AMOUNT, META_TRAVEL_FEE},
    pricing::{calculate_specialist_reimbursement, prorate, PricingRates},
    repository::{AppointmentRepository, Insert, PaymentRepository, UserRepository},
    service::charge_discovery::{discover_charge, ChargeLookup},
};

/// Page sizes for the charge scans.
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    pub customer: u64,
    pub recent: u64,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            customer: 20,
            recent: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// This call wrote the payment.
    Recorded(Payment),
    /// A completed payment already existed, possibly written by a racing call.
    AlreadyRecorded(Payment),
    /// The processor has no succeeded charge for the appointment yet.
    NoMatchingCharge,
}

impl ReconcileOutcome {
    pub fn payment(&self) -> Option<&Payment> {
        match self {
            ReconcileOutcome::Recorded(p) | ReconcileOutcome::AlreadyRecorded(p) => Some(p),
            ReconcileOutcome::NoMatchingCharge => None,
        }
    }

    pub fn into_payment(self) -> Option<Payment> {
        match self {
            ReconcileOutcome::Recorded(p) | ReconcileOutcome::AlreadyRecorded(p) => Some(p),
            ReconcileOutcome::NoMatchingCharge => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ReconcileOutcome::Recorded(_) => "Payment recorded",
            ReconcileOutcome::AlreadyRecorded(_) => "Payment already recorded",
            ReconcileOutcome::NoMatchingCharge => "No completed charge found yet",
        }
    }
}

pub struct PaymentReconciliationService {
    appointments: Arc<dyn AppointmentRepository>,
    payments: Arc<dyn PaymentRepository>,
    users: Arc<dyn UserRepository>,
    provider: Arc<dyn PaymentProvider>,
    rates: PricingRates,
    limits: ScanLimits,
}

impl PaymentReconciliationService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        payments: Arc<dyn PaymentRepository>,
        users: Arc<dyn UserRepository>,
        provider: Arc<dyn PaymentProvider>,
        rates: PricingRates,
        limits: ScanLimits,
    ) -> Self {
        Self {
            appointments,
            payments,
            users,
            provider,
            rates,
            limits,
        }
    }

    /// Makes sure the appointment has exactly one completed payment if the
    /// processor has captured a charge for it.
    ///
    /// Safe to call any number of times and concurrently with the webhook.
    pub async fn reconcile_payment(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        charge_hint: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let appointment = self.load_authorized(appointment_id, actor).await?;

        if let Some(existing) = self.payments.find_completed_by_appointment(appointment_id).await? {
            self.confirm_if_pending(&appointment).await?;
            return Ok(ReconcileOutcome::AlreadyRecorded(existing));
        }

        let customer_id = self
            .users
            .find_by_id(appointment.requester_id)
            .await?
            .and_then(|u| u.stripe_customer_id);
        let lookups = ChargeLookup::plan(
            charge_hint,
            customer_id.as_deref(),
            self.limits.customer,
            self.limits.recent,
        );

        let charge = match discover_charge(self.provider.as_ref(), appointment_id, &lookups).await? {
            Some(charge) => charge,
            None => {
                tracing::info!(appointment_id = %appointment_id, "No charge to reconcile yet");
                return Ok(ReconcileOutcome::NoMatchingCharge);
            }
        };

        let payment = build_payment(&appointment, &charge, customer_id, &self.rates);
        let outcome = match self.payments.create(payment).await? {
            Insert::Created(payment) => {
                tracing::info!(
                    appointment_id = %appointment_id,
                    payment_id = %payment.id,
                    charge_id = %charge.id,
                    amount_cents = payment.amount_cents,
                    "Payment reconciled"
                );
                ReconcileOutcome::Recorded(payment)
            }
            Insert::AlreadyExists => {
                tracing::debug!(appointment_id = %appointment_id, "Lost payment insert race");
                let winner = self
                    .payments
                    .find_completed_by_appointment(appointment_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "Payment insert for appointment {} conflicted but no completed payment exists",
                            appointment_id
                        ))
                    })?;
                ReconcileOutcome::AlreadyRecorded(winner)
            }
        };

        self.confirm_if_pending(&appointment).await?;
        Ok(outcome)
    }

    /// The completed payment for an appointment, without touching the processor.
    pub async fn find_payment(&self, appointment_id: Uuid, actor: &Actor) -> Result<Option<Payment>> {
        self.load_authorized(appointment_id, actor).await?;
        self.payments.find_completed_by_appointment(appointment_id).await
    }

    async fn load_authorized(&self, appointment_id: Uuid, actor: &Actor) -> Result<Appointment> {
        let appointment = self
            .appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

        match actor {
            Actor::System => {}
            Actor::User { is_admin: true, .. } => {}
            Actor::User { id, .. } if *id == appointment.requester_id => {}
            Actor::User { .. } => return Err(AppError::Unauthorized),
        }

        Ok(appointment)
    }

    async fn confirm_if_pending(&self, appointment: &Appointment) -> Result<()> {
        if appointment.status != AppointmentStatus::Pending {
            return Ok(());
        }

        let confirmed = self
            .appointments
            .transition_status(appointment.id, AppointmentStatus::Pending, AppointmentStatus::Confirmed)
            .await?;
        if !confirmed {
            tracing::debug!(
                appointment_id = %appointment.id,
                "Appointment left pending before confirmation; leaving it as is"
            );
        }

        Ok(())
    }
}

fn build_payment(
    appointment: &Appointment,
    charge: &ProviderCharge,
    customer_id: Option<String>,
    rates: &PricingRates,
) -> Payment {
    let now = Utc::now();
    Payment {
        id: Uuid::new_v4(),
        appointment_id: appointment.id,
        requester_id: appointment.requester_id,
        provider_id: appointment.provider_id,
        amount_cents: charge.amount_cents,
        currency: charge.currency.to_lowercase(),
        status: PaymentStatus::Completed,
        stripe_charge_id: Some(charge.id.clone()),
        stripe_customer_id: charge.customer_id.clone().or(customer_id),
        payout: compute_payout(appointment, charge, rates),
        paid_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}

/// Splits a captured charge into specialist pay, mileage, tax and margin.
///
/// Amounts recorded on the charge at checkout take precedence over the
/// appointment's stored prices.
pub fn compute_payout(
    appointment: &Appointment,
    charge: &ProviderCharge,
    rates: &PricingRates,
) -> PayoutBreakdown {
    let duration = appointment.duration_minutes.max(0);
    let specialist_pay_cents = prorate(duration, rates.specialist_hourly_rate_cents);
    let mileage_pay_cents =
        calculate_specialist_reimbursement(appointment.travel_distance_miles, rates);

    let base_service_cents = charge
        .metadata_cents(META_BASE_AMOUNT)
        .unwrap_or(appointment.base_price_cents);
    let travel_fee_cents = charge
        .metadata_cents(META_TRAVEL_FEE)
        .unwrap_or(appointment.travel_fee_cents);
    let tax_cents = charge
        .metadata_cents(META_TAX_AMOUNT)
        .unwrap_or_else(|| (charge.amount_cents - base_service_cents - travel_fee_cents).max(0));

    PayoutBreakdown {
        hours_worked: duration as f64 / 60.0,
        mileage: appointment.travel_distance_miles.max(0.0),
        specialist_pay_cents,
        mileage_pay_cents,
        company_revenue_cents: charge.amount_cents - specialist_pay_cents - mileage_pay_cents - tax_cents,
        tax_cents,
        base_service_cents,
        travel_fee_cents,
    }
}
