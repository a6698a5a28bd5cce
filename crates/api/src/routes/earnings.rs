//! Instructor earnings and payout endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use coursebill_billing::{EarningsSummary, Payout};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FailPayoutRequest {
    pub reason: String,
}

/// GET /earnings - the caller's earnings summary.
pub async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EarningsSummary>, ApiError> {
    Ok(Json(state.billing.earnings.summary(user.user_id).await?))
}

/// POST /payouts - request a payout of the full available balance.
pub async fn request_payout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Payout>, ApiError> {
    Ok(Json(
        state.billing.earnings.request_payout(user.user_id).await?,
    ))
}

/// GET /payouts - the caller's payout history.
pub async fn list_payouts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Payout>>, ApiError> {
    Ok(Json(
        state.billing.earnings.list_payouts(user.user_id).await?,
    ))
}

/// POST /admin/payouts/{id}/paid
pub async fn mark_paid(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(payout_id): Path<Uuid>,
) -> Result<Json<Payout>, ApiError> {
    user.require_admin()?;
    Ok(Json(state.billing.earnings.mark_payout_paid(payout_id).await?))
}

/// POST /admin/payouts/{id}/failed - releases the earnings for retry.
pub async fn mark_failed(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(payout_id): Path<Uuid>,
    Json(request): Json<FailPayoutRequest>,
) -> Result<Json<Payout>, ApiError> {
    user.require_admin()?;
    Ok(Json(
        state
            .billing
            .earnings
            .mark_payout_failed(payout_id, &request.reason)
            .await?,
    ))
}
