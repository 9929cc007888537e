pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    payments::StripeClient,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    stripe_client: Option<Arc<StripeClient>>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, stripe_client, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Authenticated by signature, not session
        .route("/webhooks/stripe", post(handlers::webhooks::stripe))

        .nest("/api", api_routes(app_state.clone()))

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/appointments/:id/reconcile-payment",
            post(handlers::payments::reconcile),
        )
        .route("/appointments/:id/payment", get(handlers::payments::get))
        .route("/memberships/sync", post(handlers::memberships::sync))
        .route("/pricing/quote", post(handlers::pricing::quote))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}
