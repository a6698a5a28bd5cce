//! Stripe API client wrapper

use std::collections::HashMap;

use stripe::{
    Client, CreatePaymentIntent, Currency, PaymentIntent, PaymentIntentId, PaymentIntentStatus,
};

use crate::error::{BillingError, BillingResult};

/// Stripe configuration loaded from the environment.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub currency: Currency,
}

impl StripeConfig {
    /// Reads `STRIPE_SECRET_KEY` (required) and `STRIPE_CURRENCY`
    /// (optional, defaults to usd).
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::Config("STRIPE_SECRET_KEY not set".to_string()))?;

        let currency = match std::env::var("STRIPE_CURRENCY") {
            Ok(code) => code
                .parse::<Currency>()
                .map_err(|e| BillingError::Config(format!("invalid STRIPE_CURRENCY: {}", e)))?,
            Err(_) => Currency::USD,
        };

        Ok(Self {
            secret_key,
            currency,
        })
    }
}

/// Thin wrapper over the async-stripe client holding our config.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    config: StripeConfig,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::new(config.secret_key.clone());
        Self { client, config }
    }

    pub fn from_env() -> BillingResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Create a PaymentIntent for `amount_cents` in the configured currency.
    ///
    /// Metadata keys (user_id, plan_id, purpose) let operators trace an
    /// intent back to the subscription flow that created it.
    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        metadata: HashMap<String, String>,
    ) -> BillingResult<PaymentIntent> {
        let mut params = CreatePaymentIntent::new(amount_cents, self.config.currency);
        params.metadata = Some(metadata);

        let intent = PaymentIntent::create(&self.client, params).await?;

        tracing::info!(
            payment_intent_id = %intent.id,
            amount_cents = amount_cents,
            "Created payment intent"
        );

        Ok(intent)
    }

    /// Fetch a PaymentIntent by its id string.
    pub async fn retrieve_payment_intent(&self, intent_id: &str) -> BillingResult<PaymentIntent> {
        let id = intent_id
            .parse::<PaymentIntentId>()
            .map_err(|e| BillingError::Stripe(format!("invalid payment intent id: {}", e)))?;

        Ok(PaymentIntent::retrieve(&self.client, &id, &[]).await?)
    }

    /// Fetch a PaymentIntent and require that it has settled.
    pub async fn require_settled(&self, intent_id: &str) -> BillingResult<PaymentIntent> {
        let intent = self.retrieve_payment_intent(intent_id).await?;

        if intent.status != PaymentIntentStatus::Succeeded {
            return Err(BillingError::PaymentNotSettled(format!(
                "payment intent {} has status {:?}",
                intent.id, intent.status
            )));
        }

        Ok(intent)
    }
}
