use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "VisitPay API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Billing reconciliation for in-home and remote tech support visits",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "api": "/api",
            "webhooks": "/webhooks/stripe"
        }
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "webhooks_enabled": state.webhooks_enabled(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
