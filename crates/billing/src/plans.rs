//! Plan management
//!
//! Plans are the catalog the rest of billing prices against. They are never
//! hard-deleted; a plan with subscribers is deactivated so existing
//! subscriptions keep a valid reference.

use coursebill_shared::BillingInterval;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

/// A subscription plan.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Instructor who owns the plan's content and earns a revenue share.
    pub instructor_id: Option<Uuid>,
    pub price_cents: i64,
    pub currency: String,
    pub billing_interval: BillingInterval,
    /// How long one paid period grants access.
    pub duration_days: i32,
    pub active: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    instructor_id: Option<Uuid>,
    price_cents: i64,
    currency: String,
    billing_interval: String,
    duration_days: i32,
    active: bool,
    created_at: OffsetDateTime,
}

impl TryFrom<PlanRow> for Plan {
    type Error = BillingError;

    fn try_from(row: PlanRow) -> BillingResult<Plan> {
        let billing_interval = row
            .billing_interval
            .parse::<BillingInterval>()
            .map_err(|e| BillingError::Database(e.to_string()))?;

        Ok(Plan {
            id: row.id,
            name: row.name,
            description: row.description,
            instructor_id: row.instructor_id,
            price_cents: row.price_cents,
            currency: row.currency,
            billing_interval,
            duration_days: row.duration_days,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

/// Input for creating a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanInput {
    pub name: String,
    pub description: Option<String>,
    pub instructor_id: Option<Uuid>,
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub duration_days: i32,
}

fn default_currency() -> String {
    "usd".to_string()
}

/// Input for updating a plan; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub duration_days: Option<i32>,
}

const PLAN_COLUMNS: &str = "id, name, description, instructor_id, price_cents, currency, \
     billing_interval, duration_days, active, created_at";

/// CRUD service for the plan catalog.
#[derive(Clone)]
pub struct PlanService {
    pool: PgPool,
}

impl PlanService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_plan(&self, input: CreatePlanInput) -> BillingResult<Plan> {
        if input.name.is_empty() || input.name.len() > 100 {
            return Err(BillingError::InvalidInput(
                "Plan name must be 1-100 characters".to_string(),
            ));
        }
        if input.price_cents < 0 {
            return Err(BillingError::InvalidInput(
                "Price cannot be negative".to_string(),
            ));
        }
        if input.duration_days <= 0 {
            return Err(BillingError::InvalidInput(
                "Duration must be at least one day".to_string(),
            ));
        }

        let row: PlanRow = sqlx::query_as(&format!(
            "INSERT INTO plans \
                 (name, description, instructor_id, price_cents, currency, \
                  billing_interval, duration_days) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.instructor_id)
        .bind(input.price_cents)
        .bind(input.currency.to_lowercase())
        .bind(input.billing_interval.as_str())
        .bind(input.duration_days)
        .fetch_one(&self.pool)
        .await?;

        let plan = Plan::try_from(row)?;

        tracing::info!(
            plan_id = %plan.id,
            name = %plan.name,
            price_cents = plan.price_cents,
            "Created plan"
        );

        Ok(plan)
    }

    pub async fn update_plan(&self, plan_id: Uuid, input: UpdatePlanInput) -> BillingResult<Plan> {
        if let Some(price) = input.price_cents {
            if price < 0 {
                return Err(BillingError::InvalidInput(
                    "Price cannot be negative".to_string(),
                ));
            }
        }
        if let Some(days) = input.duration_days {
            if days <= 0 {
                return Err(BillingError::InvalidInput(
                    "Duration must be at least one day".to_string(),
                ));
            }
        }

        let row: Option<PlanRow> = sqlx::query_as(&format!(
            "UPDATE plans SET \
                 name = COALESCE($1, name), \
                 description = COALESCE($2, description), \
                 price_cents = COALESCE($3, price_cents), \
                 duration_days = COALESCE($4, duration_days), \
                 updated_at = NOW() \
             WHERE id = $5 \
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price_cents)
        .bind(input.duration_days)
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await?;

        let row =
            row.ok_or_else(|| BillingError::NotFound(format!("Plan {} not found", plan_id)))?;

        Plan::try_from(row)
    }

    /// Deactivate a plan so it no longer appears in the public catalog.
    /// Existing subscriptions are unaffected.
    pub async fn deactivate_plan(&self, plan_id: Uuid) -> BillingResult<()> {
        let result = sqlx::query(
            "UPDATE plans SET active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(plan_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BillingError::NotFound(format!("Plan {} not found", plan_id)));
        }

        tracing::info!(plan_id = %plan_id, "Deactivated plan");
        Ok(())
    }

    pub async fn get_plan(&self, plan_id: Uuid) -> BillingResult<Option<Plan>> {
        let row: Option<PlanRow> = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1"
        ))
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Plan::try_from).transpose()
    }

    /// The public catalog: active plans only.
    pub async fn list_active_plans(&self) -> BillingResult<Vec<Plan>> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE active = TRUE ORDER BY price_cents"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Plan::try_from).collect()
    }

    /// Every plan including deactivated ones (admin view).
    pub async fn list_all_plans(&self) -> BillingResult<Vec<Plan>> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Plan::try_from).collect()
    }
}
