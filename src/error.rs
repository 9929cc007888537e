use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Required provider metadata is missing or malformed. Retrying will
    /// not help; the subscription or charge was provisioned incorrectly.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Subscription not ready: {0}")]
    SubscriptionNotReady(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("External service error: {0}")]
    External(String),
}

impl AppError {
    /// Stable machine-readable name sent alongside the message, so callers
    /// can tell errors that share a status code apart.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::BadRequest(_) => "bad_request",
            AppError::InvalidState(_) => "invalid_state",
            AppError::SubscriptionNotReady(_) => "subscription_not_ready",
            AppError::Internal(_) => "internal_error",
            AppError::External(_) => "external_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::InvalidState(ref msg) => {
                tracing::error!("Invalid provider state: {}", msg);
                (StatusCode::CONFLICT, msg.as_str())
            }
            AppError::SubscriptionNotReady(ref msg) => (StatusCode::CONFLICT, msg.as_str()),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::External(ref msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.as_str())
            }
        };

        let body = Json(json!({
            "success": false,
            "code": code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<stripe::StripeError> for AppError {
    fn from(err: stripe::StripeError) -> Self {
        AppError::External(format!("Stripe error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_carry_distinct_codes() {
        let invalid = AppError::InvalidState("missing user_id".to_string());
        let not_ready = AppError::SubscriptionNotReady("incomplete_expired".to_string());

        assert_eq!(invalid.code(), "invalid_state");
        assert_eq!(not_ready.code(), "subscription_not_ready");
        assert_eq!(invalid.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(not_ready.into_response().status(), StatusCode::CONFLICT);
    }
}
