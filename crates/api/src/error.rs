//! API error type and response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coursebill_billing::BillingError;

/// Error surface for all handlers; converts into a JSON error response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Not found")]
    NotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Billing(e) => match e {
                BillingError::NotFound(_) => StatusCode::NOT_FOUND,
                BillingError::InvalidInput(_) | BillingError::InsufficientPoints => {
                    StatusCode::BAD_REQUEST
                }
                BillingError::InvalidTransition { .. } => StatusCode::CONFLICT,
                BillingError::PaymentNotSettled(_) => StatusCode::PAYMENT_REQUIRED,
                BillingError::Stripe(_) | BillingError::Notify(_) => StatusCode::BAD_GATEWAY,
                BillingError::Database(_) | BillingError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs, not in the response body
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal error");
            return (
                status,
                Json(serde_json::json!({"error": "Internal server error"})),
            )
                .into_response();
        }

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}
