//! Instructor earnings and payouts.
//!
//! Each settled payment for an instructor-owned plan records an earning at
//! the platform revenue share. Instructors accumulate an available balance
//! and request payouts against it; payouts are settled or failed by an
//! operator.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::events::{BillingEvent, BillingEventLogger, BillingEventType};

/// Share of gross revenue credited to the instructor, in percent.
pub const INSTRUCTOR_REVENUE_SHARE_PERCENT: i64 = 70;

/// Minimum payout request, in cents.
pub const MIN_PAYOUT_CENTS: i64 = 5_000;

/// Aggregate earnings for an instructor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EarningsSummary {
    pub lifetime_cents: i64,
    pub available_cents: i64,
    pub paid_out_cents: i64,
}

/// A payout request and its settlement state.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub amount_cents: i64,
    pub status: String,
    pub requested_at: OffsetDateTime,
    pub settled_at: Option<OffsetDateTime>,
    pub failure_reason: Option<String>,
}

/// Instructor earnings service.
#[derive(Clone)]
pub struct EarningsService {
    pool: PgPool,
    event_logger: BillingEventLogger,
}

impl EarningsService {
    pub fn new(pool: PgPool) -> Self {
        let event_logger = BillingEventLogger::new(pool.clone());
        Self { pool, event_logger }
    }

    /// Net instructor share of a gross payment amount.
    pub fn net_share(gross_cents: i64) -> i64 {
        gross_cents * INSTRUCTOR_REVENUE_SHARE_PERCENT / 100
    }

    /// Record the instructor's share of a settled payment.
    pub async fn record_earning(
        &self,
        instructor_id: Uuid,
        payment_id: Uuid,
        gross_cents: i64,
    ) -> BillingResult<i64> {
        let net_cents = Self::net_share(gross_cents);

        sqlx::query(
            "INSERT INTO instructor_earnings (instructor_id, payment_id, gross_cents, net_cents) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(instructor_id)
        .bind(payment_id)
        .bind(gross_cents)
        .bind(net_cents)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            instructor_id = %instructor_id,
            payment_id = %payment_id,
            gross_cents = gross_cents,
            net_cents = net_cents,
            "Recorded instructor earning"
        );

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEvent::new(BillingEventType::EarningRecorded)
                    .user(instructor_id)
                    .data(serde_json::json!({
                        "payment_id": payment_id.to_string(),
                        "gross_cents": gross_cents,
                        "net_cents": net_cents,
                    })),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log earning event");
        }

        Ok(net_cents)
    }

    /// Lifetime, available and paid-out totals for an instructor.
    pub async fn summary(&self, instructor_id: Uuid) -> BillingResult<EarningsSummary> {
        let summary: EarningsSummary = sqlx::query_as(
            "SELECT \
                 COALESCE(SUM(net_cents), 0)::BIGINT AS lifetime_cents, \
                 COALESCE(SUM(net_cents) FILTER (WHERE NOT paid_out), 0)::BIGINT AS available_cents, \
                 COALESCE(SUM(net_cents) FILTER (WHERE paid_out), 0)::BIGINT AS paid_out_cents \
             FROM instructor_earnings WHERE instructor_id = $1",
        )
        .bind(instructor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// Move the instructor's entire available balance into a pending payout.
    ///
    /// The earnings rows are claimed inside the transaction before the total
    /// is checked, so a concurrent request cannot double-claim them; an early
    /// return rolls the claim back.
    pub async fn request_payout(&self, instructor_id: Uuid) -> BillingResult<Payout> {
        let mut tx = self.pool.begin().await?;

        let claimed: Vec<(Uuid, i64)> = sqlx::query_as(
            "UPDATE instructor_earnings SET paid_out = TRUE \
             WHERE instructor_id = $1 AND NOT paid_out \
             RETURNING id, net_cents",
        )
        .bind(instructor_id)
        .fetch_all(&mut *tx)
        .await?;

        let available: i64 = claimed.iter().map(|(_, net)| net).sum();

        if available < MIN_PAYOUT_CENTS {
            // dropping tx rolls the claim back
            return Err(BillingError::InvalidInput(format!(
                "Available balance {} is below the minimum payout of {} cents",
                available, MIN_PAYOUT_CENTS
            )));
        }

        let payout: Payout = sqlx::query_as(
            "INSERT INTO payouts (instructor_id, amount_cents) VALUES ($1, $2) \
             RETURNING id, instructor_id, amount_cents, status, requested_at, \
                       settled_at, failure_reason",
        )
        .bind(instructor_id)
        .bind(available)
        .fetch_one(&mut *tx)
        .await?;

        let claimed_ids: Vec<Uuid> = claimed.into_iter().map(|(id, _)| id).collect();
        sqlx::query(
            "UPDATE instructor_earnings SET payout_id = $2 WHERE id = ANY($1)",
        )
        .bind(&claimed_ids)
        .bind(payout.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            instructor_id = %instructor_id,
            payout_id = %payout.id,
            amount_cents = payout.amount_cents,
            "Payout requested"
        );

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEvent::new(BillingEventType::PayoutRequested)
                    .user(instructor_id)
                    .data(serde_json::json!({
                        "payout_id": payout.id.to_string(),
                        "amount_cents": payout.amount_cents,
                    })),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log payout request event");
        }

        Ok(payout)
    }

    /// Payouts for an instructor, newest first.
    pub async fn list_payouts(&self, instructor_id: Uuid) -> BillingResult<Vec<Payout>> {
        let rows: Vec<Payout> = sqlx::query_as(
            "SELECT id, instructor_id, amount_cents, status, requested_at, \
                    settled_at, failure_reason \
             FROM payouts WHERE instructor_id = $1 ORDER BY requested_at DESC",
        )
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Mark a pending payout as paid (operator action).
    pub async fn mark_payout_paid(&self, payout_id: Uuid) -> BillingResult<Payout> {
        let payout: Option<Payout> = sqlx::query_as(
            "UPDATE payouts SET status = 'paid', settled_at = NOW() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING id, instructor_id, amount_cents, status, requested_at, \
                       settled_at, failure_reason",
        )
        .bind(payout_id)
        .fetch_optional(&self.pool)
        .await?;

        let payout = payout.ok_or_else(|| {
            BillingError::NotFound(format!("Pending payout {} not found", payout_id))
        })?;

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEvent::new(BillingEventType::PayoutSettled)
                    .user(payout.instructor_id)
                    .data(serde_json::json!({"payout_id": payout.id.to_string()})),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log payout settled event");
        }

        Ok(payout)
    }

    /// Mark a pending payout as failed and release its earnings back to the
    /// available balance so the instructor can retry.
    pub async fn mark_payout_failed(
        &self,
        payout_id: Uuid,
        reason: &str,
    ) -> BillingResult<Payout> {
        let mut tx = self.pool.begin().await?;

        let payout: Option<Payout> = sqlx::query_as(
            "UPDATE payouts SET status = 'failed', settled_at = NOW(), failure_reason = $2 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING id, instructor_id, amount_cents, status, requested_at, \
                       settled_at, failure_reason",
        )
        .bind(payout_id)
        .bind(reason)
        .fetch_optional(&mut *tx)
        .await?;

        let payout = payout.ok_or_else(|| {
            BillingError::NotFound(format!("Pending payout {} not found", payout_id))
        })?;

        sqlx::query(
            "UPDATE instructor_earnings SET paid_out = FALSE, payout_id = NULL \
             WHERE payout_id = $1",
        )
        .bind(payout.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::warn!(
            payout_id = %payout.id,
            instructor_id = %payout.instructor_id,
            reason = reason,
            "Payout failed - earnings released"
        );

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEvent::new(BillingEventType::PayoutFailed)
                    .user(payout.instructor_id)
                    .data(serde_json::json!({
                        "payout_id": payout.id.to_string(),
                        "reason": reason,
                    })),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log payout failed event");
        }

        Ok(payout)
    }
}
