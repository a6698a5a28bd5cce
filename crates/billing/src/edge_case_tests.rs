// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Subscription Lifecycle
//!
//! Tests critical boundary conditions in:
//! - Expiry sweep (LIFE-E01 to LIFE-E02)
//! - Stale pending cleanup (LIFE-P01 to LIFE-P02)
//! - Reminder window and dispatch (LIFE-R01 to LIFE-R03)
//! - Revenue share and points math (LIFE-M01 to LIFE-M02)

#[cfg(test)]
mod sweep_edge_tests {
    use std::sync::Arc;

    use coursebill_shared::SubscriptionStatus;
    use time::macros::datetime;
    use time::Duration;

    use crate::lifecycle::{LifecycleEngine, PENDING_MAX_AGE};
    use crate::test_support::{
        active_ending, pending_created_at, FixedClock, MemoryStore, RecordingPublisher,
    };

    fn engine_at(
        store: Arc<MemoryStore>,
        publisher: Arc<RecordingPublisher>,
        now: time::OffsetDateTime,
    ) -> LifecycleEngine {
        LifecycleEngine::new(store, publisher, Arc::new(FixedClock(now)))
    }

    // =========================================================================
    // LIFE-E01: Terminal rows with past end dates are never touched by sweeps
    // =========================================================================
    #[tokio::test]
    async fn sweeps_never_mutate_terminal_rows() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let mut expired = active_ending(datetime!(2024-06-01 00:00:00 UTC));
        expired.status = SubscriptionStatus::Expired;
        let mut cancelled = active_ending(datetime!(2024-06-01 00:00:00 UTC));
        cancelled.status = SubscriptionStatus::Cancelled;
        let store = Arc::new(MemoryStore::with_subscriptions(vec![
            expired.clone(),
            cancelled.clone(),
        ]));
        let publisher = Arc::new(RecordingPublisher::new());
        let engine = engine_at(store.clone(), publisher, now);

        engine.expire_subscriptions().await.unwrap();
        engine.cancel_stale_pending().await.unwrap();
        engine.send_expiry_reminders().await.unwrap();

        assert_eq!(store.status_of(expired.id), SubscriptionStatus::Expired);
        assert_eq!(store.status_of(cancelled.id), SubscriptionStatus::Cancelled);
        assert_eq!(store.save_count(), 0, "No terminal row may be re-saved");
    }

    // =========================================================================
    // LIFE-E02: Expiry does not touch pending rows even with an end date set
    // =========================================================================
    #[tokio::test]
    async fn expiry_sweep_ignores_pending_rows() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let mut pending = pending_created_at(now - Duration::hours(1));
        pending.end_date = Some(now - Duration::days(1));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![pending.clone()]));
        let publisher = Arc::new(RecordingPublisher::new());

        let report = engine_at(store.clone(), publisher, now)
            .expire_subscriptions()
            .await
            .unwrap();

        assert_eq!(report.examined, 0);
        assert_eq!(store.status_of(pending.id), SubscriptionStatus::Pending);
    }

    // =========================================================================
    // LIFE-P01: Pending aged exactly 24h is kept; one second older is cancelled
    // =========================================================================
    #[tokio::test]
    async fn stale_pending_cutoff_is_strict() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let exactly = pending_created_at(now - PENDING_MAX_AGE);
        let older = pending_created_at(now - PENDING_MAX_AGE - Duration::seconds(1));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![
            exactly.clone(),
            older.clone(),
        ]));
        let publisher = Arc::new(RecordingPublisher::new());

        let report = engine_at(store.clone(), publisher, now)
            .cancel_stale_pending()
            .await
            .unwrap();

        assert_eq!(report.transitioned, 1);
        assert_eq!(store.status_of(exactly.id), SubscriptionStatus::Pending);
        assert_eq!(store.status_of(older.id), SubscriptionStatus::Cancelled);
    }

    // =========================================================================
    // LIFE-P02: Abandoned pending rows cancel, they never auto-activate
    // =========================================================================
    #[tokio::test]
    async fn stale_pending_never_becomes_active() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        let stale = pending_created_at(now - Duration::hours(72));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![stale.clone()]));
        let publisher = Arc::new(RecordingPublisher::new());

        engine_at(store.clone(), publisher, now)
            .cancel_stale_pending()
            .await
            .unwrap();

        let saved = store.get(stale.id).unwrap();
        assert_eq!(saved.status, SubscriptionStatus::Cancelled);
        assert!(saved.start_date.is_none(), "Cancellation must not stamp dates");
    }

    // =========================================================================
    // LIFE-R01: Re-running the reminder sweep the same day re-sends
    // (at-least-once semantics; no sent marker is kept)
    // =========================================================================
    #[tokio::test]
    async fn reminder_rerun_duplicates_without_dedup_state() {
        let now = datetime!(2024-01-01 10:00:00 UTC);
        let sub = active_ending(datetime!(2024-01-03 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![sub]));
        let publisher = Arc::new(RecordingPublisher::new());
        let engine = engine_at(store, publisher.clone(), now);

        engine.send_expiry_reminders().await.unwrap();
        engine.send_expiry_reminders().await.unwrap();

        assert_eq!(publisher.sent().len(), 2);
    }

    // =========================================================================
    // LIFE-R02: The next day's run picks up the next day's expirations only
    // =========================================================================
    #[tokio::test]
    async fn reminder_window_advances_with_the_clock() {
        let ends_jan3 = active_ending(datetime!(2024-01-03 12:00:00 UTC));
        let ends_jan4 = active_ending(datetime!(2024-01-04 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![
            ends_jan3.clone(),
            ends_jan4.clone(),
        ]));

        let day_one = Arc::new(RecordingPublisher::new());
        engine_at(
            store.clone(),
            day_one.clone(),
            datetime!(2024-01-01 09:00:00 UTC),
        )
        .send_expiry_reminders()
        .await
        .unwrap();
        assert_eq!(day_one.sent().len(), 1);
        assert_eq!(day_one.sent()[0].subscription_id, ends_jan3.id);

        let day_two = Arc::new(RecordingPublisher::new());
        engine_at(store, day_two.clone(), datetime!(2024-01-02 09:00:00 UTC))
            .send_expiry_reminders()
            .await
            .unwrap();
        assert_eq!(day_two.sent().len(), 1);
        assert_eq!(day_two.sent()[0].subscription_id, ends_jan4.id);
    }

    // =========================================================================
    // LIFE-R03: Reminder sweep leaves the store untouched
    // =========================================================================
    #[tokio::test]
    async fn reminder_sweep_never_writes_to_the_store() {
        let now = datetime!(2024-01-01 10:00:00 UTC);
        let sub = active_ending(datetime!(2024-01-03 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![sub]));
        let publisher = Arc::new(RecordingPublisher::new());

        engine_at(store.clone(), publisher, now)
            .send_expiry_reminders()
            .await
            .unwrap();

        assert_eq!(store.save_count(), 0);
    }

    // =========================================================================
    // End-to-end: one sweep day against subscriptions A, B and C
    // =========================================================================
    #[tokio::test]
    async fn full_sweep_day_scenario() {
        let now = datetime!(2024-06-15 12:00:00 UTC);
        // A: active, ended yesterday -> expired by the expiry sweep
        let a = active_ending(now - Duration::days(1));
        // B: pending, created 30h ago -> cancelled by the maintenance sweep
        let b = pending_created_at(now - Duration::hours(30));
        // C: active, ends at noon two days out -> exactly one reminder
        let c = active_ending(datetime!(2024-06-17 12:00:00 UTC));
        let store = Arc::new(MemoryStore::with_subscriptions(vec![
            a.clone(),
            b.clone(),
            c.clone(),
        ]));
        let publisher = Arc::new(RecordingPublisher::new());
        let engine = engine_at(store.clone(), publisher.clone(), now);

        engine.expire_subscriptions().await.unwrap();
        engine.cancel_stale_pending().await.unwrap();
        let reminders = engine.send_expiry_reminders().await.unwrap();

        assert_eq!(store.status_of(a.id), SubscriptionStatus::Expired);
        assert_eq!(store.status_of(b.id), SubscriptionStatus::Cancelled);
        assert_eq!(store.status_of(c.id), SubscriptionStatus::Active);

        assert_eq!(reminders.sent, 1);
        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subscription_id, c.id);
        assert_eq!(sent[0].user_id, c.user_id);
    }
}

#[cfg(test)]
mod money_math_tests {
    use crate::earnings::EarningsService;
    use crate::wallet::WalletService;

    // =========================================================================
    // LIFE-M01: Points truncate to whole currency units
    // =========================================================================
    #[test]
    fn points_truncate_sub_unit_amounts() {
        assert_eq!(WalletService::points_for_payment(0), 0);
        assert_eq!(WalletService::points_for_payment(99), 0);
        assert_eq!(WalletService::points_for_payment(100), 1);
        assert_eq!(WalletService::points_for_payment(2_999), 29);
        assert_eq!(WalletService::points_for_payment(5_000), 50);
    }

    // =========================================================================
    // LIFE-M02: Instructor net share rounds down and never exceeds gross
    // =========================================================================
    #[test]
    fn net_share_is_seventy_percent_rounded_down() {
        assert_eq!(EarningsService::net_share(0), 0);
        assert_eq!(EarningsService::net_share(100), 70);
        assert_eq!(EarningsService::net_share(999), 699);
        assert_eq!(EarningsService::net_share(2_999), 2_099);
        assert!(EarningsService::net_share(12_345) < 12_345);
    }
}
