//! Subscription lifecycle endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use coursebill_billing::{CheckoutStart, Payment, Subscription};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSubscriptionRequest {
    pub plan_id: Uuid,
    #[serde(default)]
    pub auto_renew: bool,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRenewalRequest {
    pub payment_intent_id: String,
}

/// POST /subscriptions - begin checkout for a plan.
pub async fn start(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<StartSubscriptionRequest>,
) -> Result<Json<CheckoutStart>, ApiError> {
    let checkout = state
        .billing
        .subscriptions
        .start_subscription(user.user_id, request.plan_id, request.auto_renew)
        .await?;
    Ok(Json(checkout))
}

/// GET /subscriptions - the caller's subscriptions, newest first.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    Ok(Json(
        state
            .billing
            .subscriptions
            .list_for_user(user.user_id)
            .await?,
    ))
}

/// GET /subscriptions/{id}
pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = owned_subscription(&state, &user, subscription_id).await?;
    Ok(Json(subscription))
}

/// POST /subscriptions/{id}/activate - verify payment and go live.
pub async fn activate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    owned_subscription(&state, &user, subscription_id).await?;
    let subscription = state
        .billing
        .subscriptions
        .activate_subscription(subscription_id)
        .await?;
    Ok(Json(subscription))
}

/// POST /subscriptions/{id}/renew - create the renewal PaymentIntent.
pub async fn start_renewal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<CheckoutStart>, ApiError> {
    owned_subscription(&state, &user, subscription_id).await?;
    let checkout = state
        .billing
        .subscriptions
        .start_renewal(subscription_id)
        .await?;
    Ok(Json(checkout))
}

/// POST /subscriptions/{id}/renew/complete - verify and extend.
pub async fn complete_renewal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(subscription_id): Path<Uuid>,
    Json(request): Json<CompleteRenewalRequest>,
) -> Result<Json<Subscription>, ApiError> {
    owned_subscription(&state, &user, subscription_id).await?;
    let subscription = state
        .billing
        .subscriptions
        .complete_renewal(subscription_id, &request.payment_intent_id)
        .await?;
    Ok(Json(subscription))
}

/// POST /subscriptions/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    owned_subscription(&state, &user, subscription_id).await?;
    let subscription = state
        .billing
        .subscriptions
        .cancel_subscription(subscription_id)
        .await?;
    Ok(Json(subscription))
}

/// GET /payments - the caller's payment history.
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.billing.payments.list_for_user(user.user_id).await?))
}

/// Fetch a subscription and enforce that the caller owns it (admins may see
/// any). Returns 404 rather than 403 so ids cannot be probed.
async fn owned_subscription(
    state: &AppState,
    user: &AuthUser,
    subscription_id: Uuid,
) -> Result<Subscription, ApiError> {
    let subscription = state
        .billing
        .subscriptions
        .get_subscription(subscription_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if subscription.user_id != user.user_id && !user.is_admin() {
        return Err(ApiError::NotFound);
    }

    Ok(subscription)
}
