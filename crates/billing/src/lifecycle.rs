//! Subscription lifecycle engine.
//!
//! Owns the bulk state transitions driven by the worker's schedule: expiring
//! active subscriptions past their end date, cancelling abandoned pending
//! subscriptions, and dispatching expiry reminders. The engine is handed its
//! collaborators (store, publisher, clock) explicitly so each sweep can run
//! against fakes in tests.
//!
//! Failure policy: a persistence error aborts the current sweep and is
//! returned to the caller; the next scheduled run re-selects by status, so
//! sweeps are self-healing. Inside the reminder sweep a dispatch failure is
//! logged and counted per item without stopping the batch.

use std::sync::Arc;

use coursebill_shared::SubscriptionStatus;
use serde::Serialize;
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::clock::Clock;
use crate::error::BillingResult;
use crate::notify::{PushEvent, ReminderPublisher};
use crate::store::SubscriptionStore;

/// A pending subscription older than this is considered abandoned.
pub const PENDING_MAX_AGE: Duration = Duration::hours(24);

/// How many days ahead of expiry the reminder fires.
pub const REMINDER_LEAD_DAYS: i64 = 2;

/// Outcome of a status-transition sweep.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepReport {
    /// Rows matching the sweep's status selection.
    pub examined: usize,
    /// Rows actually transitioned and persisted.
    pub transitioned: usize,
}

/// Outcome of a reminder sweep.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReminderReport {
    /// Subscriptions whose end date fell inside the reminder window.
    pub selected: usize,
    /// Reminders dispatched successfully.
    pub sent: usize,
    /// Reminders that failed to dispatch (logged, not retried this run).
    pub failed: usize,
}

/// The calendar day exactly `REMINDER_LEAD_DAYS` ahead of `now`, as an
/// inclusive `[start, end]` pair: midnight to one nanosecond before the
/// following midnight, in UTC.
pub fn reminder_window(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let target = (now.to_offset(UtcOffset::UTC) + Duration::days(REMINDER_LEAD_DAYS)).date();
    let start = target.midnight().assume_utc();
    let end = start + Duration::days(1) - Duration::nanoseconds(1);
    (start, end)
}

/// Drives bulk subscription state transitions.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn SubscriptionStore>,
    publisher: Arc<dyn ReminderPublisher>,
    clock: Arc<dyn Clock>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        publisher: Arc<dyn ReminderPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
        }
    }

    /// Transition every active subscription whose end date has passed to
    /// expired.
    ///
    /// Idempotent: expired rows drop out of the active selection, so a
    /// repeat run with no new expirations persists nothing.
    pub async fn expire_subscriptions(&self) -> BillingResult<SweepReport> {
        let now = self.clock.now();
        let active = self.store.find_by_status(SubscriptionStatus::Active).await?;
        let examined = active.len();
        let mut transitioned = 0usize;

        for mut subscription in active {
            // An active row always carries an end date; a missing one is a
            // data bug worth surfacing, not expiring.
            let Some(end_date) = subscription.end_date else {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    "Active subscription has no end date - skipping"
                );
                continue;
            };

            if end_date > now {
                continue;
            }

            subscription.status = SubscriptionStatus::Expired;
            self.store.save(&subscription).await?;
            transitioned += 1;

            tracing::debug!(
                subscription_id = %subscription.id,
                user_id = %subscription.user_id,
                end_date = %end_date,
                "Subscription expired"
            );
        }

        tracing::info!(
            examined = examined,
            transitioned = transitioned,
            "Expiry sweep complete"
        );

        Ok(SweepReport {
            examined,
            transitioned,
        })
    }

    /// Cancel pending subscriptions that were never activated within
    /// [`PENDING_MAX_AGE`] of creation.
    ///
    /// Abandoned checkouts go to cancelled, never to expired: a pending row
    /// was never billed.
    pub async fn cancel_stale_pending(&self) -> BillingResult<SweepReport> {
        let now = self.clock.now();
        let cutoff = now - PENDING_MAX_AGE;
        let pending = self
            .store
            .find_by_status(SubscriptionStatus::Pending)
            .await?;
        let examined = pending.len();
        let mut transitioned = 0usize;

        for mut subscription in pending {
            if subscription.created_at >= cutoff {
                continue;
            }

            subscription.status = SubscriptionStatus::Cancelled;
            self.store.save(&subscription).await?;
            transitioned += 1;

            tracing::debug!(
                subscription_id = %subscription.id,
                user_id = %subscription.user_id,
                created_at = %subscription.created_at,
                "Stale pending subscription cancelled"
            );
        }

        tracing::info!(
            examined = examined,
            transitioned = transitioned,
            "Stale pending cleanup complete"
        );

        Ok(SweepReport {
            examined,
            transitioned,
        })
    }

    /// Dispatch one expiry reminder per subscription whose end date lands in
    /// the reminder window (the calendar day two days from now).
    ///
    /// Selection is by end date only, not status; see DESIGN.md. No sent
    /// marker is kept, so re-running within the same day re-sends
    /// (at-least-once). A failed dispatch is logged and counted; the rest of
    /// the batch still goes out.
    pub async fn send_expiry_reminders(&self) -> BillingResult<ReminderReport> {
        let now = self.clock.now();
        let (window_start, window_end) = reminder_window(now);

        let expiring = self
            .store
            .find_expiring_between(window_start, window_end)
            .await?;
        let selected = expiring.len();
        let mut sent = 0usize;
        let mut failed = 0usize;

        for subscription in &expiring {
            let Some(end_date) = subscription.end_date else {
                continue;
            };

            let message = format!(
                "Your subscription expires on {}. Renew now to keep access to your courses.",
                end_date.date()
            );
            let event = PushEvent::expiry_reminder(
                subscription.user_id,
                subscription.id,
                message,
            );

            match self.publisher.send_push(&event).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        subscription_id = %subscription.id,
                        user_id = %subscription.user_id,
                        error = %e,
                        "Failed to dispatch expiry reminder"
                    );
                }
            }
        }

        tracing::info!(
            window_start = %window_start,
            window_end = %window_end,
            selected = selected,
            sent = sent,
            failed = failed,
            "Expiry reminder sweep complete"
        );

        Ok(ReminderReport {
            selected,
            sent,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        active_ending, pending_created_at, FixedClock, MemoryStore, RecordingPublisher,
    };
    use time::macros::datetime;

    fn engine(
        store: Arc<MemoryStore>,
        publisher: Arc<RecordingPublisher>,
        now: OffsetDateTime,
    ) -> LifecycleEngine {
        LifecycleEngine::new(store, publisher, Arc::new(FixedClock(now)))
    }

    #[tokio::test]
    async fn expiry_sweep_expires_only_past_due() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let due = active_ending(datetime!(2024-06-14 12:00:00 UTC));
        let boundary = active_ending(now);
        let future = active_ending(datetime!(2024-06-20 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![
            due.clone(),
            boundary.clone(),
            future.clone(),
        ]));
        let publisher = Arc::new(RecordingPublisher::new());

        let report = engine(store.clone(), publisher, now)
            .expire_subscriptions()
            .await
            .unwrap();

        assert_eq!(report.examined, 3);
        // end_date <= now is due, so the boundary row expires too
        assert_eq!(report.transitioned, 2);
        assert_eq!(store.status_of(due.id), SubscriptionStatus::Expired);
        assert_eq!(store.status_of(boundary.id), SubscriptionStatus::Expired);
        assert_eq!(store.status_of(future.id), SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn expiry_sweep_is_idempotent() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let due = active_ending(datetime!(2024-06-14 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![due]));
        let publisher = Arc::new(RecordingPublisher::new());
        let engine = engine(store.clone(), publisher, now);

        let first = engine.expire_subscriptions().await.unwrap();
        assert_eq!(first.transitioned, 1);

        let second = engine.expire_subscriptions().await.unwrap();
        assert_eq!(second.examined, 0);
        assert_eq!(second.transitioned, 0);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn expiry_sweep_surfaces_store_failure() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let due = active_ending(datetime!(2024-06-14 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![due]));
        store.fail_saves(true);
        let publisher = Arc::new(RecordingPublisher::new());

        let result = engine(store, publisher, now).expire_subscriptions().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn maintenance_cancels_only_stale_pending() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let stale = pending_created_at(datetime!(2024-06-14 06:00:00 UTC)); // 30h old
        let fresh = pending_created_at(datetime!(2024-06-15 02:00:00 UTC)); // 10h old
        let store = Arc::new(MemoryStore::with_subscriptions(vec![
            stale.clone(),
            fresh.clone(),
        ]));
        let publisher = Arc::new(RecordingPublisher::new());

        let report = engine(store.clone(), publisher.clone(), now)
            .cancel_stale_pending()
            .await
            .unwrap();

        assert_eq!(report.transitioned, 1);
        assert_eq!(store.status_of(stale.id), SubscriptionStatus::Cancelled);
        assert_eq!(store.status_of(fresh.id), SubscriptionStatus::Pending);
        // cleanup never notifies
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn maintenance_is_idempotent() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let stale = pending_created_at(datetime!(2024-06-13 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![stale]));
        let publisher = Arc::new(RecordingPublisher::new());
        let engine = engine(store.clone(), publisher, now);

        engine.cancel_stale_pending().await.unwrap();
        let second = engine.cancel_stale_pending().await.unwrap();

        assert_eq!(second.examined, 0);
        assert_eq!(second.transitioned, 0);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn reminder_window_is_the_full_day_two_days_out() {
        let now = datetime!(2024-01-01 10:00:00 UTC);
        let (start, end) = reminder_window(now);

        assert_eq!(start, datetime!(2024-01-03 00:00:00 UTC));
        assert_eq!(end, datetime!(2024-01-03 23:59:59.999999999 UTC));
    }

    #[test]
    fn reminder_window_rolls_over_month_boundaries() {
        let now = datetime!(2024-01-30 23:00:00 UTC);
        let (start, end) = reminder_window(now);

        assert_eq!(start, datetime!(2024-02-01 00:00:00 UTC));
        assert_eq!(end, datetime!(2024-02-01 23:59:59.999999999 UTC));
    }

    #[tokio::test]
    async fn reminder_sweep_selects_only_the_window() {
        let now = datetime!(2024-01-01 10:00:00 UTC);
        let inside_start = active_ending(datetime!(2024-01-03 00:00:00 UTC));
        let inside_noon = active_ending(datetime!(2024-01-03 12:00:00 UTC));
        let inside_end = active_ending(datetime!(2024-01-03 23:59:59.999999999 UTC));
        let before = active_ending(datetime!(2024-01-02 23:59:59 UTC));
        let after = active_ending(datetime!(2024-01-04 00:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![
            inside_start.clone(),
            inside_noon.clone(),
            inside_end.clone(),
            before,
            after,
        ]));
        let publisher = Arc::new(RecordingPublisher::new());

        let report = engine(store, publisher.clone(), now)
            .send_expiry_reminders()
            .await
            .unwrap();

        assert_eq!(report.selected, 3);
        assert_eq!(report.sent, 3);
        assert_eq!(report.failed, 0);

        let sent_ids: Vec<_> = publisher
            .sent()
            .iter()
            .map(|e| e.subscription_id)
            .collect();
        assert!(sent_ids.contains(&inside_start.id));
        assert!(sent_ids.contains(&inside_noon.id));
        assert!(sent_ids.contains(&inside_end.id));
    }

    #[tokio::test]
    async fn reminder_dispatch_failure_is_isolated() {
        let now = datetime!(2024-01-01 10:00:00 UTC);
        let first = active_ending(datetime!(2024-01-03 08:00:00 UTC));
        let second = active_ending(datetime!(2024-01-03 12:00:00 UTC));
        let third = active_ending(datetime!(2024-01-03 18:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![
            first.clone(),
            second.clone(),
            third.clone(),
        ]));
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.fail_for(second.id);

        let report = engine(store, publisher.clone(), now)
            .send_expiry_reminders()
            .await
            .unwrap();

        assert_eq!(report.selected, 3);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);

        // the failing item was attempted, and both neighbours got through
        assert_eq!(publisher.attempts(), 3);
        let sent_ids: Vec<_> = publisher
            .sent()
            .iter()
            .map(|e| e.subscription_id)
            .collect();
        assert!(sent_ids.contains(&first.id));
        assert!(sent_ids.contains(&third.id));
        assert!(!sent_ids.contains(&second.id));
    }

    #[tokio::test]
    async fn reminder_events_carry_the_fixed_tags() {
        let now = datetime!(2024-01-01 10:00:00 UTC);
        let sub = active_ending(datetime!(2024-01-03 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![sub.clone()]));
        let publisher = Arc::new(RecordingPublisher::new());

        engine(store, publisher.clone(), now)
            .send_expiry_reminders()
            .await
            .unwrap();

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_type, "EXPIRY_REMINDER");
        assert_eq!(sent[0].notification_type, "EXPIRY_ALERT");
        assert_eq!(sent[0].user_id, sub.user_id);
        assert!(sent[0].message.contains("2024-01-03"));
    }

    #[tokio::test]
    async fn reminder_sweep_does_not_filter_by_status() {
        // A cancelled row whose stale end date lands in the window is still
        // selected; see the open-question note in DESIGN.md.
        let now = datetime!(2024-01-01 10:00:00 UTC);
        let mut cancelled = active_ending(datetime!(2024-01-03 12:00:00 UTC));
        cancelled.status = SubscriptionStatus::Cancelled;
        let store = Arc::new(MemoryStore::with_subscriptions(vec![cancelled.clone()]));
        let publisher = Arc::new(RecordingPublisher::new());

        let report = engine(store.clone(), publisher.clone(), now)
            .send_expiry_reminders()
            .await
            .unwrap();

        assert_eq!(report.sent, 1);
        // and the sweep never mutates status
        assert_eq!(store.status_of(cancelled.id), SubscriptionStatus::Cancelled);
    }
}
