//! Billing error types

use coursebill_shared::SubscriptionStatus;

pub type BillingResult<T> = Result<T, BillingError>;

/// Errors produced by the billing services.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Stripe API error: {0}")]
    Stripe(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient points balance")]
    InsufficientPoints,

    #[error("Payment not settled: {0}")]
    PaymentNotSettled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification dispatch failed: {0}")]
    Notify(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => BillingError::NotFound("row not found".to_string()),
            other => BillingError::Database(other.to_string()),
        }
    }
}

impl From<stripe::StripeError> for BillingError {
    fn from(e: stripe::StripeError) -> Self {
        BillingError::Stripe(e.to_string())
    }
}
