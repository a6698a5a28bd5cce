//! Payment bookkeeping.
//!
//! Settled Stripe PaymentIntents are recorded here exactly once; the intent
//! id carries a unique constraint so replaying a confirmation cannot create
//! a duplicate row.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// What a payment was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPurpose {
    Activation,
    Renewal,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Activation => "activation",
            PaymentPurpose::Renewal => "renewal",
        }
    }
}

/// One settled payment.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub stripe_payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub purpose: String,
    pub created_at: OffsetDateTime,
}

/// Records settled payments.
#[derive(Clone)]
pub struct PaymentService {
    pool: PgPool,
}

impl PaymentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a payment record, or return the existing one when the intent
    /// was already recorded (idempotent on the intent id).
    pub async fn record_payment(
        &self,
        user_id: Uuid,
        subscription_id: Option<Uuid>,
        intent_id: &str,
        amount_cents: i64,
        currency: &str,
        purpose: PaymentPurpose,
    ) -> BillingResult<Payment> {
        let payment: Option<Payment> = sqlx::query_as(
            "INSERT INTO payments \
                 (user_id, subscription_id, stripe_payment_intent_id, \
                  amount_cents, currency, purpose) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (stripe_payment_intent_id) DO NOTHING \
             RETURNING id, user_id, subscription_id, stripe_payment_intent_id, \
                       amount_cents, currency, purpose, created_at",
        )
        .bind(user_id)
        .bind(subscription_id)
        .bind(intent_id)
        .bind(amount_cents)
        .bind(currency)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match payment {
            Some(payment) => {
                tracing::info!(
                    payment_id = %payment.id,
                    user_id = %user_id,
                    amount_cents = amount_cents,
                    purpose = purpose.as_str(),
                    "Recorded payment"
                );
                Ok(payment)
            }
            None => {
                tracing::debug!(
                    intent_id = intent_id,
                    "Payment already recorded - returning existing row"
                );
                self.find_by_intent(intent_id).await
            }
        }
    }

    async fn find_by_intent(&self, intent_id: &str) -> BillingResult<Payment> {
        let payment: Payment = sqlx::query_as(
            "SELECT id, user_id, subscription_id, stripe_payment_intent_id, \
                    amount_cents, currency, purpose, created_at \
             FROM payments WHERE stripe_payment_intent_id = $1",
        )
        .bind(intent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Payment history for a user, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> BillingResult<Vec<Payment>> {
        let rows: Vec<Payment> = sqlx::query_as(
            "SELECT id, user_id, subscription_id, stripe_payment_intent_id, \
                    amount_cents, currency, purpose, created_at \
             FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
