//! In-memory payment provider for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    payments::provider::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOperation {
    RetrieveCharge,
    ListCustomerCharges,
    ListRecentCharges,
    RetrieveSubscription,
    RetrieveInvoice,
}

#[derive(Default)]
struct FakeState {
    charges: Vec<ProviderCharge>,
    subscriptions: HashMap<String, ProviderSubscription>,
    invoices: HashMap<String, ProviderInvoice>,
    failing: Vec<FakeOperation>,
    calls: HashMap<FakeOperation, usize>,
}

#[derive(Default)]
pub struct FakeStripeGateway {
    state: Mutex<FakeState>,
}

impl FakeStripeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_charge(&self, charge: ProviderCharge) {
        self.state.lock().await.charges.push(charge);
    }

    pub async fn add_subscription(&self, subscription: ProviderSubscription) {
        self.state
            .lock()
            .await
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub async fn add_invoice(&self, invoice: ProviderInvoice) {
        self.state.lock().await.invoices.insert(invoice.id.clone(), invoice);
    }

    /// Makes every later call of `operation` fail like a network error.
    pub async fn fail(&self, operation: FakeOperation) {
        self.state.lock().await.failing.push(operation);
    }

    pub async fn recover(&self, operation: FakeOperation) {
        self.state.lock().await.failing.retain(|op| *op != operation);
    }

    pub async fn calls(&self, operation: FakeOperation) -> usize {
        self.state.lock().await.calls.get(&operation).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    async fn record(&self, operation: FakeOperation) -> Result<tokio::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().await;
        *state.calls.entry(operation).or_insert(0) += 1;
        if state.failing.contains(&operation) {
            return Err(AppError::External(format!("Stripe error: {:?} unavailable", operation)));
        }
        Ok(state)
    }
}

#[async_trait]
impl PaymentProvider for FakeStripeGateway {
    async fn retrieve_charge(&self, charge_id: &str) -> Result<ProviderCharge> {
        let state = self.record(FakeOperation::RetrieveCharge).await?;
        state
            .charges
            .iter()
            .find(|c| c.id == charge_id)
            .cloned()
            .ok_or_else(|| AppError::External(format!("No such charge: {}", charge_id)))
    }

    async fn list_charges(&self, customer_id: Option<&str>, limit: u64) -> Result<Vec<ProviderCharge>> {
        let operation = match customer_id {
            Some(_) => FakeOperation::ListCustomerCharges,
            None => FakeOperation::ListRecentCharges,
        };
        let state = self.record(operation).await?;

        let mut charges: Vec<ProviderCharge> = state
            .charges
            .iter()
            .filter(|c| customer_id.map_or(true, |id| c.customer_id.as_deref() == Some(id)))
            .cloned()
            .collect();
        charges.sort_by(|a, b| b.created.cmp(&a.created));
        charges.truncate(limit as usize);

        Ok(charges)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription> {
        let state = self.record(FakeOperation::RetrieveSubscription).await?;
        state
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| AppError::External(format!("No such subscription: {}", subscription_id)))
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<ProviderInvoice> {
        let state = self.record(FakeOperation::RetrieveInvoice).await?;
        state
            .invoices
            .get(invoice_id)
            .cloned()
            .ok_or_else(|| AppError::External(format!("No such invoice: {}", invoice_id)))
    }
}

/// A succeeded charge tagged with `appointment_id`.
pub fn succeeded_charge(
    id: &str,
    appointment_id: Uuid,
    amount_cents: i64,
    customer_id: Option<&str>,
) -> ProviderCharge {
    ProviderCharge {
        id: id.to_string(),
        status: ChargeState::Succeeded,
        amount_cents,
        currency: "usd".to_string(),
        customer_id: customer_id.map(str::to_string),
        metadata: HashMap::from([(META_APPOINTMENT_ID.to_string(), appointment_id.to_string())]),
        created: chrono::Utc::now().timestamp(),
    }
}

/// A subscription owned by `user_id` on `plan_id`.
pub fn subscription(
    id: &str,
    status: SubscriptionState,
    user_id: Uuid,
    plan_id: Uuid,
    latest_invoice_id: Option<&str>,
) -> ProviderSubscription {
    ProviderSubscription {
        id: id.to_string(),
        status,
        customer_id: Some("cus_test".to_string()),
        metadata: HashMap::from([
            (META_USER_ID.to_string(), user_id.to_string()),
            (META_PLAN_ID.to_string(), plan_id.to_string()),
        ]),
        current_period_end: Some(chrono::Utc::now() + chrono::Duration::days(30)),
        latest_invoice_id: latest_invoice_id.map(str::to_string),
    }
}
