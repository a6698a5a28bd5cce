//! Points wallet endpoints.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use coursebill_billing::{Wallet, WalletTransaction};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub points: i64,
    pub reason: Option<String>,
}

/// GET /wallet - current balance.
pub async fn balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(state.billing.wallet.balance(user.user_id).await?))
}

/// GET /wallet/transactions - ledger history, newest first.
pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    Ok(Json(
        state
            .billing
            .wallet
            .history(user.user_id, query.limit)
            .await?,
    ))
}

/// POST /wallet/redeem - spend points.
pub async fn redeem(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<Wallet>, ApiError> {
    let reason = request.reason.as_deref().unwrap_or("redemption");
    let wallet = state
        .billing
        .wallet
        .debit(user.user_id, request.points, reason)
        .await?;
    Ok(Json(wallet))
}
