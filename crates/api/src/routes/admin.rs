//! On-demand sweep triggers.
//!
//! The worker runs these on timers; operators can also invoke them directly
//! (and tests exercise the same entry points). Each returns the sweep's
//! report so the caller can see what changed.

use axum::extract::State;
use axum::{Extension, Json};
use coursebill_billing::{ReminderReport, SweepReport};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /admin/sweeps/expire
pub async fn run_expiry_sweep(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SweepReport>, ApiError> {
    user.require_admin()?;
    tracing::info!(admin = %user.user_id, "Manual expiry sweep triggered");
    Ok(Json(state.billing.lifecycle.expire_subscriptions().await?))
}

/// POST /admin/sweeps/maintenance
pub async fn run_maintenance_sweep(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SweepReport>, ApiError> {
    user.require_admin()?;
    tracing::info!(admin = %user.user_id, "Manual maintenance sweep triggered");
    Ok(Json(state.billing.lifecycle.cancel_stale_pending().await?))
}

/// POST /admin/sweeps/reminders
///
/// Note: reminders carry no dedup state, so re-running within the same day
/// re-sends to every subscription still in the window.
pub async fn run_reminder_sweep(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ReminderReport>, ApiError> {
    user.require_admin()?;
    tracing::info!(admin = %user.user_id, "Manual reminder sweep triggered");
    Ok(Json(state.billing.lifecycle.send_expiry_reminders().await?))
}
