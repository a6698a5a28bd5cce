//! Subscription checkout and lifecycle operations.
//!
//! The request-serving counterpart to the lifecycle engine's sweeps: starting
//! a checkout, activating after payment, renewing, and cancelling. Every
//! transition goes through the shared state machine; sweeps own the
//! expired/stale paths.

use std::collections::HashMap;

use coursebill_shared::SubscriptionStatus;
use serde::Serialize;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::client::StripeGateway;
use crate::earnings::EarningsService;
use crate::error::{BillingError, BillingResult};
use crate::events::{BillingEvent, BillingEventLogger, BillingEventType};
use crate::payments::{PaymentPurpose, PaymentService};
use crate::plans::{Plan, PlanService};
use crate::store::{PgSubscriptionStore, Subscription, SubscriptionStore};
use crate::wallet::WalletService;

/// Result of starting a checkout: the pending subscription plus the Stripe
/// client secret the frontend confirms the payment with.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStart {
    pub subscription: Subscription,
    pub client_secret: Option<String>,
    pub amount_cents: i64,
}

/// Subscription service for the request-serving side of the lifecycle.
#[derive(Clone)]
pub struct SubscriptionService {
    stripe: StripeGateway,
    store: PgSubscriptionStore,
    plans: PlanService,
    wallet: WalletService,
    earnings: EarningsService,
    payments: PaymentService,
    event_logger: BillingEventLogger,
}

impl SubscriptionService {
    pub fn new(stripe: StripeGateway, pool: PgPool) -> Self {
        Self {
            stripe,
            store: PgSubscriptionStore::new(pool.clone()),
            plans: PlanService::new(pool.clone()),
            wallet: WalletService::new(pool.clone()),
            earnings: EarningsService::new(pool.clone()),
            payments: PaymentService::new(pool.clone()),
            event_logger: BillingEventLogger::new(pool),
        }
    }

    /// Create a pending subscription and the PaymentIntent that pays for it.
    pub async fn start_subscription(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        auto_renew: bool,
    ) -> BillingResult<CheckoutStart> {
        let plan = self.require_active_plan(plan_id).await?;

        let mut subscription = Subscription {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            status: SubscriptionStatus::Pending,
            start_date: None,
            end_date: None,
            auto_renew,
            stripe_payment_intent_id: None,
            created_at: OffsetDateTime::now_utc(),
        };

        let intent = self
            .stripe
            .create_payment_intent(
                plan.price_cents,
                intent_metadata(user_id, &plan, &subscription, "activation"),
            )
            .await?;

        subscription.stripe_payment_intent_id = Some(intent.id.to_string());
        let subscription = self.store.save(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %user_id,
            plan_id = %plan_id,
            "Started subscription checkout"
        );

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEvent::new(BillingEventType::SubscriptionStarted)
                    .user(user_id)
                    .subscription(subscription.id)
                    .data(serde_json::json!({"plan_id": plan_id.to_string()})),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log subscription started event");
        }

        Ok(CheckoutStart {
            client_secret: intent.client_secret,
            amount_cents: plan.price_cents,
            subscription,
        })
    }

    /// Activate a pending subscription after its payment settled.
    ///
    /// Verifies the PaymentIntent with Stripe, then moves PENDING -> ACTIVE
    /// and stamps the access period from the plan duration.
    pub async fn activate_subscription(
        &self,
        subscription_id: Uuid,
    ) -> BillingResult<Subscription> {
        let mut subscription = self.require_subscription(subscription_id).await?;
        self.require_transition(&subscription, SubscriptionStatus::Active)?;

        let intent_id = subscription
            .stripe_payment_intent_id
            .clone()
            .ok_or_else(|| {
                BillingError::PaymentNotSettled(format!(
                    "subscription {} has no payment intent",
                    subscription_id
                ))
            })?;
        let intent = self.stripe.require_settled(&intent_id).await?;

        let plan = self.require_plan(subscription.plan_id).await?;

        let now = OffsetDateTime::now_utc();
        subscription.status = SubscriptionStatus::Active;
        subscription.start_date = Some(now);
        subscription.end_date = Some(now + Duration::days(i64::from(plan.duration_days)));
        let subscription = self.store.save(&subscription).await?;

        let payment = self
            .payments
            .record_payment(
                subscription.user_id,
                Some(subscription.id),
                &intent_id,
                intent.amount,
                &plan.currency,
                PaymentPurpose::Activation,
            )
            .await?;

        self.settle_side_effects(&subscription, &plan, payment.id, intent.amount, "activation")
            .await;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            end_date = ?subscription.end_date,
            "Activated subscription"
        );

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEvent::new(BillingEventType::SubscriptionActivated)
                    .user(subscription.user_id)
                    .subscription(subscription.id)
                    .data(serde_json::json!({
                        "plan_id": plan.id.to_string(),
                        "amount_cents": intent.amount,
                    })),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log activation event");
        }

        Ok(subscription)
    }

    /// Create a PaymentIntent for renewing an active subscription.
    pub async fn start_renewal(&self, subscription_id: Uuid) -> BillingResult<CheckoutStart> {
        let subscription = self.require_subscription(subscription_id).await?;

        if subscription.status != SubscriptionStatus::Active {
            return Err(BillingError::InvalidInput(format!(
                "Only active subscriptions can be renewed (status is {})",
                subscription.status
            )));
        }

        let plan = self.require_plan(subscription.plan_id).await?;

        let intent = self
            .stripe
            .create_payment_intent(
                plan.price_cents,
                intent_metadata(subscription.user_id, &plan, &subscription, "renewal"),
            )
            .await?;

        Ok(CheckoutStart {
            client_secret: intent.client_secret,
            amount_cents: plan.price_cents,
            subscription,
        })
    }

    /// Extend an active subscription after a renewal payment settled.
    ///
    /// The new period runs from the later of the current end date and now,
    /// so renewing early never shortens access.
    pub async fn complete_renewal(
        &self,
        subscription_id: Uuid,
        intent_id: &str,
    ) -> BillingResult<Subscription> {
        let mut subscription = self.require_subscription(subscription_id).await?;

        if subscription.status != SubscriptionStatus::Active {
            return Err(BillingError::InvalidInput(format!(
                "Only active subscriptions can be renewed (status is {})",
                subscription.status
            )));
        }

        let intent = self.stripe.require_settled(intent_id).await?;
        let plan = self.require_plan(subscription.plan_id).await?;

        let now = OffsetDateTime::now_utc();
        let base = subscription.end_date.map_or(now, |end| end.max(now));
        subscription.end_date = Some(base + Duration::days(i64::from(plan.duration_days)));
        let subscription = self.store.save(&subscription).await?;

        let payment = self
            .payments
            .record_payment(
                subscription.user_id,
                Some(subscription.id),
                intent_id,
                intent.amount,
                &plan.currency,
                PaymentPurpose::Renewal,
            )
            .await?;

        self.settle_side_effects(&subscription, &plan, payment.id, intent.amount, "renewal")
            .await;

        tracing::info!(
            subscription_id = %subscription.id,
            end_date = ?subscription.end_date,
            "Renewed subscription"
        );

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEvent::new(BillingEventType::SubscriptionRenewed)
                    .user(subscription.user_id)
                    .subscription(subscription.id)
                    .data(serde_json::json!({"amount_cents": intent.amount})),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log renewal event");
        }

        Ok(subscription)
    }

    /// Cancel a pending or active subscription.
    pub async fn cancel_subscription(
        &self,
        subscription_id: Uuid,
    ) -> BillingResult<Subscription> {
        let mut subscription = self.require_subscription(subscription_id).await?;
        self.require_transition(&subscription, SubscriptionStatus::Cancelled)?;

        subscription.status = SubscriptionStatus::Cancelled;
        subscription.auto_renew = false;
        let subscription = self.store.save(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            "Cancelled subscription"
        );

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEvent::new(BillingEventType::SubscriptionCancelled)
                    .user(subscription.user_id)
                    .subscription(subscription.id),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log cancellation event");
        }

        Ok(subscription)
    }

    pub async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> BillingResult<Option<Subscription>> {
        self.store.find_by_id(subscription_id).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> BillingResult<Vec<Subscription>> {
        self.store.find_by_user(user_id).await
    }

    /// Wallet credit and instructor earning after a settled payment. Neither
    /// may fail the payment that already went through; failures are logged.
    async fn settle_side_effects(
        &self,
        subscription: &Subscription,
        plan: &Plan,
        payment_id: Uuid,
        amount_cents: i64,
        reason: &str,
    ) {
        let points = WalletService::points_for_payment(amount_cents);
        if points > 0 {
            if let Err(e) = self
                .wallet
                .credit(subscription.user_id, points, reason, Some(subscription.id))
                .await
            {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to credit loyalty points"
                );
            }
        }

        if let Some(instructor_id) = plan.instructor_id {
            if let Err(e) = self
                .earnings
                .record_earning(instructor_id, payment_id, amount_cents)
                .await
            {
                tracing::warn!(
                    payment_id = %payment_id,
                    instructor_id = %instructor_id,
                    error = %e,
                    "Failed to record instructor earning"
                );
            }
        }
    }

    async fn require_subscription(&self, subscription_id: Uuid) -> BillingResult<Subscription> {
        self.store
            .find_by_id(subscription_id)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!("Subscription {} not found", subscription_id))
            })
    }

    fn require_transition(
        &self,
        subscription: &Subscription,
        to: SubscriptionStatus,
    ) -> BillingResult<()> {
        if subscription.status == to || !subscription.status.can_transition(to) {
            return Err(BillingError::InvalidTransition {
                from: subscription.status,
                to,
            });
        }
        Ok(())
    }

    async fn require_plan(&self, plan_id: Uuid) -> BillingResult<Plan> {
        self.plans
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("Plan {} not found", plan_id)))
    }

    async fn require_active_plan(&self, plan_id: Uuid) -> BillingResult<Plan> {
        let plan = self.require_plan(plan_id).await?;
        if !plan.active {
            return Err(BillingError::InvalidInput(format!(
                "Plan {} is no longer available",
                plan_id
            )));
        }
        Ok(plan)
    }
}

fn intent_metadata(
    user_id: Uuid,
    plan: &Plan,
    subscription: &Subscription,
    purpose: &str,
) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("user_id".to_string(), user_id.to_string());
    metadata.insert("plan_id".to_string(), plan.id.to_string());
    metadata.insert("subscription_id".to_string(), subscription.id.to_string());
    metadata.insert("purpose".to_string(), purpose.to_string());
    metadata
}
