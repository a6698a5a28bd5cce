//! Plan catalog endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use coursebill_billing::{CreatePlanInput, Plan, UpdatePlanInput};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /plans - active plans, no auth required.
pub async fn list_public(State(state): State<AppState>) -> Result<Json<Vec<Plan>>, ApiError> {
    Ok(Json(state.billing.plans.list_active_plans().await?))
}

/// GET /plans/{id}
pub async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<Plan>, ApiError> {
    let plan = state
        .billing
        .plans
        .get_plan(plan_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(plan))
}

/// GET /admin/plans - every plan including deactivated ones.
pub async fn list_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Plan>>, ApiError> {
    user.require_admin()?;
    Ok(Json(state.billing.plans.list_all_plans().await?))
}

/// POST /admin/plans
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreatePlanInput>,
) -> Result<Json<Plan>, ApiError> {
    user.require_admin()?;
    Ok(Json(state.billing.plans.create_plan(input).await?))
}

/// PUT /admin/plans/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(plan_id): Path<Uuid>,
    Json(input): Json<UpdatePlanInput>,
) -> Result<Json<Plan>, ApiError> {
    user.require_admin()?;
    Ok(Json(state.billing.plans.update_plan(plan_id, input).await?))
}

/// DELETE /admin/plans/{id} - deactivates; plans are never hard-deleted.
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require_admin()?;
    state.billing.plans.deactivate_plan(plan_id).await?;
    Ok(Json(serde_json::json!({"deactivated": plan_id})))
}
