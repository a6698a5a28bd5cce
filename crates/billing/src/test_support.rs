//! In-memory fakes for the lifecycle engine's capabilities.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use coursebill_shared::SubscriptionStatus;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::notify::{PushEvent, ReminderPublisher};
use crate::store::{Subscription, SubscriptionStore};

/// Clock pinned to a single instant.
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// HashMap-backed subscription store with an optional failure switch.
#[derive(Default)]
pub struct MemoryStore {
    subs: Mutex<HashMap<Uuid, Subscription>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn with_subscriptions(subs: Vec<Subscription>) -> Self {
        let map = subs.into_iter().map(|s| (s.id, s)).collect();
        Self {
            subs: Mutex::new(map),
            ..Default::default()
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn status_of(&self, id: Uuid) -> SubscriptionStatus {
        self.subs.lock().unwrap()[&id].status
    }

    pub fn get(&self, id: Uuid) -> Option<Subscription> {
        self.subs.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> BillingResult<Vec<Subscription>> {
        Ok(self
            .subs
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn find_expiring_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> BillingResult<Vec<Subscription>> {
        Ok(self
            .subs
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.end_date.map(|d| d >= start && d <= end).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn save(&self, subscription: &Subscription) -> BillingResult<Subscription> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(BillingError::Database("simulated store failure".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.subs
            .lock()
            .unwrap()
            .insert(subscription.id, subscription.clone());
        Ok(subscription.clone())
    }
}

/// Publisher that records every event and can fail for chosen subscriptions.
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<PushEvent>>,
    fail_for: Mutex<HashSet<Uuid>>,
    attempts: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, subscription_id: Uuid) {
        self.fail_for.lock().unwrap().insert(subscription_id);
    }

    pub fn sent(&self) -> Vec<PushEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReminderPublisher for RecordingPublisher {
    async fn send_push(&self, event: &PushEvent) -> BillingResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.lock().unwrap().contains(&event.subscription_id) {
            return Err(BillingError::Notify("simulated dispatch failure".to_string()));
        }
        self.sent.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// An active subscription ending at `end_date`.
pub fn active_ending(end_date: OffsetDateTime) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        plan_id: Uuid::new_v4(),
        status: SubscriptionStatus::Active,
        start_date: Some(end_date - time::Duration::days(30)),
        end_date: Some(end_date),
        auto_renew: false,
        stripe_payment_intent_id: None,
        created_at: end_date - time::Duration::days(30),
    }
}

/// A pending subscription created at `created_at`, no dates set yet.
pub fn pending_created_at(created_at: OffsetDateTime) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        plan_id: Uuid::new_v4(),
        status: SubscriptionStatus::Pending,
        start_date: None,
        end_date: None,
        auto_renew: false,
        stripe_payment_intent_id: None,
        created_at,
    }
}
