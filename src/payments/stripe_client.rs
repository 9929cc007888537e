use async_trait::async_trait;
use chrono::DateTime;
use serde::Serialize;
use std::collections::HashMap;
use stripe::{
    Charge, ChargeId, Client, EventObject, EventType, Expandable, Invoice, InvoiceId,
    ListCharges, Subscription, SubscriptionId, Webhook, WebhookError,
};

use crate::{
    error::{AppError, Result},
    payments::provider::{
        ChargeState, PaymentProvider, ProviderCharge, ProviderEvent, ProviderInvoice,
        ProviderSubscription, SubscriptionState,
    },
};

pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(api_key: String, webhook_secret: String) -> Self {
        let client = Client::new(api_key);
        Self {
            client,
            webhook_secret,
        }
    }

    /// Verifies the webhook signature and narrows the event down to the
    /// notifications reconciliation cares about.
    pub fn construct_event(&self, payload: &str, stripe_signature: &str) -> Result<ProviderEvent> {
        let event = Webhook::construct_event(payload, stripe_signature, &self.webhook_secret)
            .map_err(|e| match e {
                WebhookError::BadSignature => AppError::BadRequest("Invalid signature".to_string()),
                _ => AppError::External(format!("Webhook error: {}", e)),
            })?;

        let parsed = match (event.type_, event.data.object) {
            (EventType::ChargeSucceeded, EventObject::Charge(charge)) => {
                ProviderEvent::ChargeSucceeded(charge_snapshot(&charge))
            }
            (
                EventType::CustomerSubscriptionCreated | EventType::CustomerSubscriptionUpdated,
                EventObject::Subscription(subscription),
            ) => ProviderEvent::SubscriptionChanged(subscription_snapshot(&subscription)?),
            (EventType::InvoicePaid, EventObject::Invoice(invoice)) => ProviderEvent::InvoicePaid {
                subscription_id: invoice.subscription.as_ref().map(|s| s.id().to_string()),
            },
            (other, _) => ProviderEvent::Ignored(format!("{:?}", other)),
        };

        Ok(parsed)
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn retrieve_charge(&self, charge_id: &str) -> Result<ProviderCharge> {
        let id = charge_id
            .parse::<ChargeId>()
            .map_err(|_| AppError::BadRequest(format!("Invalid charge id: {}", charge_id)))?;

        let charge = Charge::retrieve(&self.client, &id, &[]).await?;
        Ok(charge_snapshot(&charge))
    }

    async fn list_charges(&self, customer_id: Option<&str>, limit: u64) -> Result<Vec<ProviderCharge>> {
        let mut params = ListCharges::new();
        params.limit = Some(limit);
        if let Some(customer_id) = customer_id {
            let customer = customer_id
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid customer id: {}", customer_id)))?;
            params.customer = Some(customer);
        }

        let charges = Charge::list(&self.client, &params).await?;
        Ok(charges.data.iter().map(charge_snapshot).collect())
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription> {
        let id = subscription_id.parse::<SubscriptionId>().map_err(|_| {
            AppError::BadRequest(format!("Invalid subscription id: {}", subscription_id))
        })?;

        let subscription = Subscription::retrieve(&self.client, &id, &[]).await?;
        subscription_snapshot(&subscription)
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<ProviderInvoice> {
        let id = invoice_id
            .parse::<InvoiceId>()
            .map_err(|_| AppError::BadRequest(format!("Invalid invoice id: {}", invoice_id)))?;

        let invoice = Invoice::retrieve(&self.client, &id, &["payment_intent"]).await?;
        let payment_intent_status = match &invoice.payment_intent {
            Some(Expandable::Object(intent)) => Some(intent.status.as_str().to_string()),
            _ => None,
        };

        Ok(ProviderInvoice {
            id: invoice.id.to_string(),
            status: invoice.status.map(|s| s.as_str().to_string()),
            paid: invoice.paid.unwrap_or(false),
            payment_intent_status,
        })
    }
}

fn charge_snapshot(charge: &Charge) -> ProviderCharge {
    ProviderCharge {
        id: charge.id.to_string(),
        status: ChargeState::from_str(charge.status.as_str()),
        amount_cents: charge.amount,
        currency: charge.currency.to_string(),
        customer_id: charge.customer.as_ref().map(|c| c.id().to_string()),
        metadata: metadata_map(&charge.metadata),
        created: charge.created,
    }
}

fn subscription_snapshot(subscription: &Subscription) -> Result<ProviderSubscription> {
    let status = SubscriptionState::from_str(subscription.status.as_str()).ok_or_else(|| {
        AppError::External(format!(
            "Unrecognised subscription status: {}",
            subscription.status.as_str()
        ))
    })?;

    Ok(ProviderSubscription {
        id: subscription.id.to_string(),
        status,
        customer_id: Some(subscription.customer.id().to_string()),
        metadata: metadata_map(&subscription.metadata),
        current_period_end: DateTime::from_timestamp(subscription.current_period_end, 0),
        latest_invoice_id: subscription.latest_invoice.as_ref().map(|i| i.id().to_string()),
    })
}

/// Stripe metadata is optional on some objects and not on others; going
/// through serde accepts either shape.
fn metadata_map<T: Serialize>(metadata: &T) -> HashMap<String, String> {
    serde_json::to_value(metadata)
        .ok()
        .and_then(|v| serde_json::from_value::<Option<HashMap<String, String>>>(v).ok())
        .flatten()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_map_accepts_optional_and_plain_maps() {
        let plain = HashMap::from([("appointment_id".to_string(), "abc".to_string())]);
        assert_eq!(metadata_map(&plain).get("appointment_id").map(String::as_str), Some("abc"));

        let missing: Option<HashMap<String, String>> = None;
        assert!(metadata_map(&missing).is_empty());

        let present = Some(plain.clone());
        assert_eq!(metadata_map(&present), plain);
    }
}
