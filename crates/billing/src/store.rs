//! Subscription persistence capability.
//!
//! The lifecycle engine talks to storage through the `SubscriptionStore`
//! trait; `PgSubscriptionStore` is the Postgres implementation used by the
//! api and worker binaries. Tests substitute an in-memory store.

use async_trait::async_trait;
use coursebill_shared::SubscriptionStatus;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

/// A user subscription record.
///
/// `start_date`/`end_date` are `None` only while the row is still pending;
/// both are set when the subscription is activated.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
    pub auto_renew: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_payment_intent_id: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Storage operations the lifecycle engine depends on.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions currently in `status`.
    async fn find_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> BillingResult<Vec<Subscription>>;

    /// All subscriptions whose `end_date` falls within `[start, end]`,
    /// regardless of status.
    async fn find_expiring_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> BillingResult<Vec<Subscription>>;

    /// Persist the given record, returning the stored row.
    async fn save(&self, subscription: &Subscription) -> BillingResult<Subscription>;
}

/// Row shape read back from Postgres; status is stored as text.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    plan_id: Uuid,
    status: String,
    start_date: Option<OffsetDateTime>,
    end_date: Option<OffsetDateTime>,
    auto_renew: bool,
    stripe_payment_intent_id: Option<String>,
    created_at: OffsetDateTime,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = BillingError;

    fn try_from(row: SubscriptionRow) -> BillingResult<Subscription> {
        let status = row
            .status
            .parse::<SubscriptionStatus>()
            .map_err(|e| BillingError::Database(e.to_string()))?;

        Ok(Subscription {
            id: row.id,
            user_id: row.user_id,
            plan_id: row.plan_id,
            status,
            start_date: row.start_date,
            end_date: row.end_date,
            auto_renew: row.auto_renew,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, plan_id, status, start_date, end_date, \
     auto_renew, stripe_payment_intent_id, created_at";

/// Postgres-backed subscription store.
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a single subscription by id.
    pub async fn find_by_id(&self, id: Uuid) -> BillingResult<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    /// All subscriptions belonging to `user_id`, newest first.
    pub async fn find_by_user(&self, user_id: Uuid) -> BillingResult<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn find_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> BillingResult<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions WHERE status = $1"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn find_expiring_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> BillingResult<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions \
             WHERE end_date IS NOT NULL AND end_date >= $1 AND end_date <= $2"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn save(&self, subscription: &Subscription) -> BillingResult<Subscription> {
        let row: SubscriptionRow = sqlx::query_as(&format!(
            "INSERT INTO subscriptions \
                 (id, user_id, plan_id, status, start_date, end_date, \
                  auto_renew, stripe_payment_intent_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
                 status = EXCLUDED.status, \
                 start_date = EXCLUDED.start_date, \
                 end_date = EXCLUDED.end_date, \
                 auto_renew = EXCLUDED.auto_renew, \
                 stripe_payment_intent_id = EXCLUDED.stripe_payment_intent_id, \
                 updated_at = NOW() \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(subscription.id)
        .bind(subscription.user_id)
        .bind(subscription.plan_id)
        .bind(subscription.status.as_str())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.auto_renew)
        .bind(&subscription.stripe_payment_intent_id)
        .bind(subscription.created_at)
        .fetch_one(&self.pool)
        .await?;

        Subscription::try_from(row)
    }
}
