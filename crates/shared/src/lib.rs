//! Shared types and database helpers for the coursebill workspace.
//!
//! Everything here is consumed by at least two of the api/billing/worker
//! crates: the subscription status state machine, plan interval types, and
//! the Postgres pool/migration helpers.

mod db;
mod types;

pub use db::{create_pool, run_migrations};
pub use types::{BillingInterval, InvalidInterval, InvalidStatus, SubscriptionStatus};
