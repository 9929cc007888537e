//! HTTP client for the reconciliation endpoints, used by callers that
//! just completed a checkout.

pub mod cache;
pub mod retry;

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    api::handlers::{memberships::SyncResponse, payments::PaymentResponse},
    domain::Payment,
};

pub use cache::Timestamped;
pub use retry::{Backoff, PollOutcome, PollStep, RetryPolicy, Retryable, TerminalAction};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
}

impl ClientError {
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Http(_) => None,
            ClientError::Status { code, .. } => code.as_deref(),
        }
    }
}

impl Retryable for ClientError {
    /// Transport failures, server-side failures and subscriptions the
    /// processor has not finished setting up. Everything else is final.
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Status { status, code, .. } => match code.as_deref() {
                Some(code) => matches!(
                    code,
                    "subscription_not_ready" | "external_error" | "database_error" | "internal_error"
                ),
                None => status.is_server_error(),
            },
        }
    }
}

pub struct ReconcileClient {
    http: reqwest::Client,
    base_url: String,
    session_cookie: String,
}

impl ReconcileClient {
    pub fn new(base_url: &str, cookie_name: &str, session_token: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie: format!("{}={}", cookie_name, session_token),
        })
    }

    /// Reads the recorded payment without asking the server to reconcile.
    pub async fn probe_payment(&self, appointment_id: Uuid) -> Result<Option<Payment>, ClientError> {
        let url = format!("{}/api/appointments/{}/payment", self.base_url, appointment_id);
        let response = self
            .http
            .get(url)
            .header(reqwest::header::COOKIE, &self.session_cookie)
            .send()
            .await?;

        let body: PaymentResponse = check(response).await?.json().await?;
        Ok(body.payment)
    }

    pub async fn reconcile_payment(
        &self,
        appointment_id: Uuid,
        charge_hint: Option<&str>,
    ) -> Result<Option<Payment>, ClientError> {
        let url = format!(
            "{}/api/appointments/{}/reconcile-payment",
            self.base_url, appointment_id
        );
        let response = self
            .http
            .post(url)
            .header(reqwest::header::COOKIE, &self.session_cookie)
            .json(&serde_json::json!({ "charge_hint": charge_hint }))
            .send()
            .await?;

        let body: PaymentResponse = check(response).await?.json().await?;
        Ok(body.payment)
    }

    pub async fn sync_membership(&self, subscription_id: &str) -> Result<SyncResponse, ClientError> {
        let url = format!("{}/api/memberships/sync", self.base_url);
        let response = self
            .http
            .post(url)
            .header(reqwest::header::COOKIE, &self.session_cookie)
            .json(&serde_json::json!({ "subscription_id": subscription_id }))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Waits for the appointment's payment: probes first, then asks the
    /// server to reconcile. Probes inside `min_refetch` of the previous one
    /// reuse its answer.
    pub async fn await_payment(
        &self,
        appointment_id: Uuid,
        charge_hint: Option<&str>,
        policy: &RetryPolicy,
        min_refetch: Duration,
    ) -> PollOutcome<Payment, ClientError> {
        let last_probe = Mutex::new(None);

        policy
            .run(|_, step| {
                let last_probe = &last_probe;
                async move {
                    match step {
                        PollStep::Probe => self.probe_cached(appointment_id, last_probe, min_refetch).await,
                        PollStep::Escalate => self.reconcile_payment(appointment_id, charge_hint).await,
                    }
                }
            })
            .await
    }

    async fn probe_cached(
        &self,
        appointment_id: Uuid,
        last_probe: &Mutex<Option<Timestamped<Option<Payment>>>>,
        min_refetch: Duration,
    ) -> Result<Option<Payment>, ClientError> {
        let mut last = last_probe.lock().await;
        if let Some(cached) = last.as_ref().and_then(|entry| entry.fresh(min_refetch)) {
            return Ok(cached.clone());
        }

        let payment = self.probe_payment(appointment_id).await?;
        *last = Some(Timestamped::new(payment.clone()));
        Ok(payment)
    }

    /// Syncs until the server stops reporting the subscription as not ready.
    pub async fn await_membership(
        &self,
        subscription_id: &str,
        policy: &RetryPolicy,
    ) -> PollOutcome<SyncResponse, ClientError> {
        policy
            .run(|_, _| async move { self.sync_membership(subscription_id).await.map(Some) })
            .await
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.json::<serde_json::Value>().await.ok();
    let field = |name: &str| {
        body.as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    Err(ClientError::Status {
        status,
        code: field("code"),
        message: field("error").unwrap_or_else(|| status.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: StatusCode, code: Option<&str>) -> ClientError {
        ClientError::Status {
            status,
            code: code.map(str::to_string),
            message: status.to_string(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(status(StatusCode::CONFLICT, Some("subscription_not_ready")).is_retryable());
        assert!(status(StatusCode::BAD_GATEWAY, Some("external_error")).is_retryable());
        assert!(status(StatusCode::SERVICE_UNAVAILABLE, None).is_retryable());

        assert!(!status(StatusCode::CONFLICT, Some("invalid_state")).is_retryable());
        assert!(!status(StatusCode::FORBIDDEN, Some("forbidden")).is_retryable());
        assert!(!status(StatusCode::UNAUTHORIZED, Some("unauthorized")).is_retryable());
        assert!(!status(StatusCode::CONFLICT, None).is_retryable());
    }
}
