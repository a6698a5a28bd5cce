//! Push notification publishing.
//!
//! Reminders are handed to an external notification service over HTTP.
//! Delivery is fire-and-forget from this crate's perspective: the publisher
//! reports success once the event is accepted, and the lifecycle engine
//! isolates per-event failures so one bad dispatch never stops a batch.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

/// Event type tag carried on expiry reminders.
pub const EVENT_EXPIRY_REMINDER: &str = "EXPIRY_REMINDER";
/// Notification category tag carried on expiry reminders.
pub const NOTIFICATION_EXPIRY_ALERT: &str = "EXPIRY_ALERT";

/// Payload accepted by the notification service's push endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub event_type: String,
    pub message: String,
    pub notification_type: String,
}

impl PushEvent {
    /// Build the expiry reminder event for a subscription.
    pub fn expiry_reminder(user_id: Uuid, subscription_id: Uuid, message: String) -> Self {
        Self {
            user_id,
            subscription_id,
            event_type: EVENT_EXPIRY_REMINDER.to_string(),
            message,
            notification_type: NOTIFICATION_EXPIRY_ALERT.to_string(),
        }
    }
}

/// Capability for dispatching push events.
#[async_trait]
pub trait ReminderPublisher: Send + Sync {
    async fn send_push(&self, event: &PushEvent) -> BillingResult<()>;
}

/// HTTP client for the external notification service.
///
/// Requests are bounded by a connect/request timeout so a hung downstream
/// cannot stall a sweep indefinitely.
#[derive(Clone)]
pub struct PushClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl PushClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Self::build_http(),
            base_url: Some(base_url.into()),
        }
    }

    /// Read `NOTIFY_BASE_URL` from the environment. When unset the client is
    /// disabled: events are logged and dropped instead of delivered.
    pub fn from_env() -> Self {
        let base_url = std::env::var("NOTIFY_BASE_URL").ok().filter(|v| !v.is_empty());
        if base_url.is_none() {
            tracing::warn!("NOTIFY_BASE_URL not set - push notifications disabled");
        }
        Self {
            http: Self::build_http(),
            base_url,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    fn build_http() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReminderPublisher for PushClient {
    async fn send_push(&self, event: &PushEvent) -> BillingResult<()> {
        let Some(base_url) = &self.base_url else {
            tracing::debug!(
                user_id = %event.user_id,
                subscription_id = %event.subscription_id,
                event_type = %event.event_type,
                "Push client disabled - dropping event"
            );
            return Ok(());
        };

        let url = format!("{}/notifications/push", base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|e| BillingError::Notify(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Notify(format!(
                "notification service returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
