use axum::{
    extract::{Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::MembershipStatus,
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub subscription_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    pub membership_id: Uuid,
    pub status: MembershipStatus,
    pub message: String,
}

pub async fn sync(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>> {
    let subscription_id = request.subscription_id.trim();
    if subscription_id.is_empty() {
        return Err(AppError::BadRequest("subscription_id is required".to_string()));
    }

    let outcome = state
        .service_context
        .membership_service
        .sync_membership(subscription_id, &user.actor())
        .await?;

    let membership = outcome.membership();
    Ok(Json(SyncResponse {
        success: true,
        membership_id: membership.id,
        status: membership.status,
        message: outcome.message().to_string(),
    }))
}
