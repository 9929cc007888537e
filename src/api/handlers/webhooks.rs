use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    api::state::AppState,
    domain::Actor,
    error::{AppError, Result},
    payments::ProviderEvent,
};

pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: String,
) -> Result<Json<Value>> {
    let stripe_client = state
        .stripe_client
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Stripe webhooks are not configured".to_string()))?;

    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let event = stripe_client.construct_event(&payload, signature)?;
    let result = dispatch(&state, event).await;

    match result {
        Ok(()) => Ok(Json(json!({ "received": true }))),
        // Redelivery cannot fix these, so the event is acknowledged.
        Err(e @ (AppError::NotFound(_) | AppError::InvalidState(_) | AppError::SubscriptionNotReady(_))) => {
            tracing::warn!("Webhook event not applied: {}", e);
            Ok(Json(json!({ "received": true, "applied": false })))
        }
        Err(e) => Err(e),
    }
}

async fn dispatch(state: &AppState, event: ProviderEvent) -> Result<()> {
    let services = &state.service_context;

    match event {
        ProviderEvent::ChargeSucceeded(charge) => {
            let Some(appointment_id) = charge.appointment_id() else {
                tracing::debug!(charge_id = %charge.id, "Charge has no appointment metadata");
                return Ok(());
            };
            let outcome = services
                .payment_service
                .reconcile_payment(appointment_id, &Actor::System, Some(&charge.id))
                .await?;
            tracing::info!(
                appointment_id = %appointment_id,
                charge_id = %charge.id,
                "Webhook reconcile: {}",
                outcome.message()
            );
        }
        ProviderEvent::SubscriptionChanged(subscription) => {
            let outcome = services
                .membership_service
                .sync_membership(&subscription.id, &Actor::System)
                .await?;
            tracing::info!(subscription_id = %subscription.id, "Webhook sync: {}", outcome.message());
        }
        ProviderEvent::InvoicePaid { subscription_id: Some(subscription_id) } => {
            let outcome = services
                .membership_service
                .sync_membership(&subscription_id, &Actor::System)
                .await?;
            tracing::info!(subscription_id = %subscription_id, "Webhook sync: {}", outcome.message());
        }
        ProviderEvent::InvoicePaid { subscription_id: None } => {
            tracing::debug!("Paid invoice is not tied to a subscription");
        }
        ProviderEvent::Ignored(event_type) => {
            tracing::debug!("Unhandled webhook event type: {}", event_type);
        }
    }

    Ok(())
}
