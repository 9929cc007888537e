use std::sync::Arc;

use crate::{config::Settings, payments::StripeClient, service::ServiceContext};

/// Shared by every handler and the session middleware.
#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    /// Present only when Stripe is enabled; webhooks are refused without it.
    pub stripe_client: Option<Arc<StripeClient>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        stripe_client: Option<Arc<StripeClient>>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            service_context,
            stripe_client,
            settings,
        }
    }

    pub fn webhooks_enabled(&self) -> bool {
        self.stripe_client.is_some()
    }
}
