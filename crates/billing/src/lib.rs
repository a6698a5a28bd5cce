// Billing crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Coursebill Billing Module
//!
//! Handles plans, user subscriptions, the loyalty points wallet, instructor
//! earnings, and Stripe payment processing.
//!
//! ## Features
//!
//! - **Plan Management**: Create, update, deactivate subscription plans
//! - **Subscription Lifecycle**: Checkout, activation, renewal, cancellation
//! - **Lifecycle Sweeps**: Expiry, stale-pending cleanup, expiry reminders
//! - **Points Wallet**: Loyalty points earned on payments, redeemable
//! - **Instructor Earnings**: Revenue share accrual and payouts
//! - **Payments**: Stripe PaymentIntent creation and settlement checks

pub mod client;
pub mod clock;
pub mod earnings;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod notify;
pub mod payments;
pub mod plans;
pub mod store;
pub mod subscriptions;
pub mod wallet;

#[cfg(test)]
mod edge_case_tests;
#[cfg(test)]
pub(crate) mod test_support;

// Client
pub use client::{StripeConfig, StripeGateway};

// Clock
pub use clock::{Clock, SystemClock};

// Earnings
pub use earnings::{
    EarningsService, EarningsSummary, Payout, INSTRUCTOR_REVENUE_SHARE_PERCENT, MIN_PAYOUT_CENTS,
};

// Error
pub use error::{BillingError, BillingResult};

// Events
pub use events::{BillingEvent, BillingEventLogger, BillingEventType};

// Lifecycle
pub use lifecycle::{
    reminder_window, LifecycleEngine, ReminderReport, SweepReport, PENDING_MAX_AGE,
    REMINDER_LEAD_DAYS,
};

// Notify
pub use notify::{PushClient, PushEvent, ReminderPublisher};

// Payments
pub use payments::{Payment, PaymentPurpose, PaymentService};

// Plans
pub use plans::{CreatePlanInput, Plan, PlanService, UpdatePlanInput};

// Store
pub use store::{PgSubscriptionStore, Subscription, SubscriptionStore};

// Subscriptions
pub use subscriptions::{CheckoutStart, SubscriptionService};

// Wallet
pub use wallet::{Wallet, WalletService, WalletTransaction};

use std::sync::Arc;

use sqlx::PgPool;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub plans: PlanService,
    pub subscriptions: SubscriptionService,
    pub wallet: WalletService,
    pub earnings: EarningsService,
    pub payments: PaymentService,
    pub lifecycle: LifecycleEngine,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let stripe = StripeGateway::from_env()?;
        let push = PushClient::from_env();
        Ok(Self::new(stripe, push, pool))
    }

    /// Create a new billing service with explicit collaborators
    pub fn new(stripe: StripeGateway, push: PushClient, pool: PgPool) -> Self {
        let lifecycle = LifecycleEngine::new(
            Arc::new(PgSubscriptionStore::new(pool.clone())),
            Arc::new(push),
            Arc::new(SystemClock),
        );

        Self {
            plans: PlanService::new(pool.clone()),
            subscriptions: SubscriptionService::new(stripe, pool.clone()),
            wallet: WalletService::new(pool.clone()),
            earnings: EarningsService::new(pool.clone()),
            payments: PaymentService::new(pool),
            lifecycle,
        }
    }
}
