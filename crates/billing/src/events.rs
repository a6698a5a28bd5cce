//! Billing event audit log.
//!
//! Append-only record of domain events. Logging failures are reported to the
//! caller, which warns and moves on; the audit trail must never block the
//! operation it describes.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::BillingResult;

/// Kinds of audit events written by the billing services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventType {
    SubscriptionStarted,
    SubscriptionActivated,
    SubscriptionRenewed,
    SubscriptionCancelled,
    PointsCredited,
    PointsRedeemed,
    EarningRecorded,
    PayoutRequested,
    PayoutSettled,
    PayoutFailed,
}

impl BillingEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingEventType::SubscriptionStarted => "subscription_started",
            BillingEventType::SubscriptionActivated => "subscription_activated",
            BillingEventType::SubscriptionRenewed => "subscription_renewed",
            BillingEventType::SubscriptionCancelled => "subscription_cancelled",
            BillingEventType::PointsCredited => "points_credited",
            BillingEventType::PointsRedeemed => "points_redeemed",
            BillingEventType::EarningRecorded => "earning_recorded",
            BillingEventType::PayoutRequested => "payout_requested",
            BillingEventType::PayoutSettled => "payout_settled",
            BillingEventType::PayoutFailed => "payout_failed",
        }
    }
}

/// One audit event, built up before logging.
#[derive(Debug, Clone)]
pub struct BillingEvent {
    pub event_type: BillingEventType,
    pub user_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub data: serde_json::Value,
}

impl BillingEvent {
    pub fn new(event_type: BillingEventType) -> Self {
        Self {
            event_type,
            user_id: None,
            subscription_id: None,
            data: serde_json::json!({}),
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn subscription(mut self, subscription_id: Uuid) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Writes audit events to the billing_events table.
#[derive(Clone)]
pub struct BillingEventLogger {
    pool: PgPool,
}

impl BillingEventLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log_event(&self, event: BillingEvent) -> BillingResult<()> {
        sqlx::query(
            "INSERT INTO billing_events (event_type, user_id, subscription_id, data) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(event.event_type.as_str())
        .bind(event.user_id)
        .bind(event.subscription_id)
        .bind(&event.data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
