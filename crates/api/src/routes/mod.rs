//! Route table

mod admin;
mod earnings;
mod plans;
mod subscriptions;
mod wallet;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::state::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Build the full router: a public surface (health, plan catalog) and an
/// authenticated surface behind the bearer-token middleware.
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/plans", get(plans::list_public))
        .route("/plans/{id}", get(plans::get_plan));

    let authed = Router::new()
        // Subscriptions
        .route(
            "/subscriptions",
            post(subscriptions::start).get(subscriptions::list_mine),
        )
        .route("/subscriptions/{id}", get(subscriptions::get_one))
        .route("/subscriptions/{id}/activate", post(subscriptions::activate))
        .route("/subscriptions/{id}/renew", post(subscriptions::start_renewal))
        .route(
            "/subscriptions/{id}/renew/complete",
            post(subscriptions::complete_renewal),
        )
        .route("/subscriptions/{id}/cancel", post(subscriptions::cancel))
        .route("/payments", get(subscriptions::list_payments))
        // Wallet
        .route("/wallet", get(wallet::balance))
        .route("/wallet/transactions", get(wallet::history))
        .route("/wallet/redeem", post(wallet::redeem))
        // Instructor earnings
        .route("/earnings", get(earnings::summary))
        .route(
            "/payouts",
            post(earnings::request_payout).get(earnings::list_payouts),
        )
        // Admin: plan management
        .route("/admin/plans", post(plans::create).get(plans::list_all))
        .route(
            "/admin/plans/{id}",
            put(plans::update).delete(plans::deactivate),
        )
        // Admin: payout settlement
        .route("/admin/payouts/{id}/paid", post(earnings::mark_paid))
        .route("/admin/payouts/{id}/failed", post(earnings::mark_failed))
        // Admin: on-demand sweep triggers (the worker runs these on timers)
        .route("/admin/sweeps/expire", post(admin::run_expiry_sweep))
        .route(
            "/admin/sweeps/maintenance",
            post(admin::run_maintenance_sweep),
        )
        .route("/admin/sweeps/reminders", post(admin::run_reminder_sweep))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    public
        .merge(authed)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
