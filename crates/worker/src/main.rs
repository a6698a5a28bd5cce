//! Coursebill Background Worker
//!
//! Handles scheduled jobs including:
//! - Subscription expiry sweep (hourly)
//! - Stale pending subscription cleanup (daily at 3:30 AM UTC)
//! - Expiry reminder dispatch (daily at 9:00 AM UTC)
//! - Health check heartbeat (every 5 minutes)
//!
//! Every job body catches and logs its own failure so one bad run never
//! stops future ticks; the sweeps re-select by status each run and heal
//! themselves on the next tick.

use std::sync::Arc;
use std::time::Duration;

use coursebill_billing::{LifecycleEngine, PgSubscriptionStore, PushClient, SystemClock};
use sqlx::postgres::PgPoolOptions;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Create a database connection pool
async fn create_db_pool() -> anyhow::Result<sqlx::PgPool> {
    #[allow(clippy::expect_used)] // Fail-fast on startup if required config is missing
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await?;

    info!("Database pool created");
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting Coursebill Worker");

    // Create database pool
    let pool = create_db_pool().await?;

    // Wire the lifecycle engine: Postgres store, HTTP push publisher,
    // system clock. The engine itself never reads globals.
    let store = Arc::new(PgSubscriptionStore::new(pool.clone()));
    let publisher = Arc::new(PushClient::from_env());
    let engine = Arc::new(LifecycleEngine::new(store, publisher, Arc::new(SystemClock)));

    // Create scheduler
    let scheduler = JobScheduler::new().await?;

    // Job 1: Expire subscriptions past their end date (hourly)
    let expiry_engine = engine.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let engine = expiry_engine.clone();
            Box::pin(async move {
                info!("Running scheduled subscription expiry sweep");
                match engine.expire_subscriptions().await {
                    Ok(report) => info!(
                        examined = report.examined,
                        transitioned = report.transitioned,
                        "Expiry sweep finished"
                    ),
                    Err(e) => error!(error = %e, "Expiry sweep failed - will retry next tick"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Subscription expiry sweep (hourly)");

    // Job 2: Cancel abandoned pending subscriptions (daily at 3:30 AM UTC)
    let maintenance_engine = engine.clone();
    scheduler
        .add(Job::new_async("0 30 3 * * *", move |_uuid, _l| {
            let engine = maintenance_engine.clone();
            Box::pin(async move {
                info!("Running daily maintenance sweep");
                match engine.cancel_stale_pending().await {
                    Ok(report) => info!(
                        examined = report.examined,
                        transitioned = report.transitioned,
                        "Maintenance sweep finished"
                    ),
                    Err(e) => error!(error = %e, "Maintenance sweep failed - will retry next tick"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Stale pending cleanup (daily at 3:30 AM UTC)");

    // Job 3: Send expiry reminders (daily at 9:00 AM UTC)
    let reminder_engine = engine.clone();
    scheduler
        .add(Job::new_async("0 0 9 * * *", move |_uuid, _l| {
            let engine = reminder_engine.clone();
            Box::pin(async move {
                info!("Running daily expiry reminder sweep");
                match engine.send_expiry_reminders().await {
                    Ok(report) => info!(
                        selected = report.selected,
                        sent = report.sent,
                        failed = report.failed,
                        "Reminder sweep finished"
                    ),
                    Err(e) => error!(error = %e, "Reminder sweep failed - will retry next tick"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Expiry reminders (daily at 9:00 AM UTC)");

    // Job 4: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    // Start the scheduler
    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("Coursebill Worker started successfully with 4 scheduled jobs");

    // Keep the main task running
    // The scheduler runs jobs in background tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
