use axum::{extract::State, Json};

use crate::{
    api::state::AppState,
    error::Result,
    service::pricing_service::{Quote, QuoteRequest},
};

pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Quote>> {
    let quote = state.service_context.pricing_service.quote(&request).await?;
    Ok(Json(quote))
}
