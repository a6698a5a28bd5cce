//! Application state

use std::sync::Arc;

use coursebill_billing::BillingService;
use sqlx::PgPool;

use crate::auth::JwtVerifier;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub billing: Arc<BillingService>,
    pub jwt: JwtVerifier,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let billing = BillingService::from_env(pool.clone())
            .map_err(|e| anyhow::anyhow!("Failed to initialize billing: {}", e))?;
        tracing::info!("Stripe billing service initialized");

        let jwt = JwtVerifier::new(&config.auth_jwt_secret);

        Ok(Self {
            pool,
            config,
            billing: Arc::new(billing),
            jwt,
        })
    }
}
