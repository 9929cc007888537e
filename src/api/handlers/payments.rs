use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::Payment,
    error::Result,
};

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileRequest {
    pub charge_hint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub payment: Option<Payment>,
    pub message: String,
}

pub async fn reconcile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<ReconcileRequest>>,
) -> Result<Json<PaymentResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let outcome = state
        .service_context
        .payment_service
        .reconcile_payment(appointment_id, &user.actor(), request.charge_hint.as_deref())
        .await?;

    let message = outcome.message().to_string();
    Ok(Json(PaymentResponse {
        success: true,
        payment: outcome.into_payment(),
        message,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>> {
    let payment = state
        .service_context
        .payment_service
        .find_payment(appointment_id, &user.actor())
        .await?;

    let message = match payment {
        Some(_) => "Payment recorded",
        None => "No payment recorded yet",
    };

    Ok(Json(PaymentResponse {
        success: true,
        payment,
        message: message.to_string(),
    }))
}
