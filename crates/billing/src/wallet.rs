//! Loyalty points wallet.
//!
//! One wallet row per user plus an append-only transaction ledger. Points
//! are credited on activation and renewal (one point per whole currency
//! unit paid) and debited on redemption.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

/// Points earned per 100 cents paid.
pub const POINTS_PER_CURRENCY_UNIT: i64 = 1;

/// Current wallet state for a user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: i64,
    pub lifetime_earned: i64,
}

/// One ledger entry; positive amounts are credits, negative are debits.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub subscription_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

/// Points wallet service.
#[derive(Clone)]
pub struct WalletService {
    pool: PgPool,
}

impl WalletService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Points earned for a payment of `amount_cents`.
    pub fn points_for_payment(amount_cents: i64) -> i64 {
        (amount_cents / 100) * POINTS_PER_CURRENCY_UNIT
    }

    /// Credit `points` to the user's wallet, creating the wallet on first
    /// touch, and append a ledger entry.
    pub async fn credit(
        &self,
        user_id: Uuid,
        points: i64,
        reason: &str,
        subscription_id: Option<Uuid>,
    ) -> BillingResult<Wallet> {
        if points <= 0 {
            return Err(BillingError::InvalidInput(
                "Credit amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let wallet: Wallet = sqlx::query_as(
            "INSERT INTO wallets (user_id, balance, lifetime_earned) \
             VALUES ($1, $2, $2) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 balance = wallets.balance + EXCLUDED.balance, \
                 lifetime_earned = wallets.lifetime_earned + EXCLUDED.balance, \
                 updated_at = NOW() \
             RETURNING user_id, balance, lifetime_earned",
        )
        .bind(user_id)
        .bind(points)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO wallet_transactions (user_id, amount, reason, subscription_id) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(points)
        .bind(reason)
        .bind(subscription_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            points = points,
            reason = reason,
            balance = wallet.balance,
            "Credited wallet"
        );

        Ok(wallet)
    }

    /// Debit `points` from the user's wallet for a redemption.
    ///
    /// The balance is checked and decremented in one guarded UPDATE so
    /// concurrent redemptions cannot overdraw.
    pub async fn debit(&self, user_id: Uuid, points: i64, reason: &str) -> BillingResult<Wallet> {
        if points <= 0 {
            return Err(BillingError::InvalidInput(
                "Redemption amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let wallet: Option<Wallet> = sqlx::query_as(
            "UPDATE wallets SET balance = balance - $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance >= $2 \
             RETURNING user_id, balance, lifetime_earned",
        )
        .bind(user_id)
        .bind(points)
        .fetch_optional(&mut *tx)
        .await?;

        let wallet = wallet.ok_or(BillingError::InsufficientPoints)?;

        sqlx::query(
            "INSERT INTO wallet_transactions (user_id, amount, reason) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(-points)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            points = points,
            reason = reason,
            balance = wallet.balance,
            "Debited wallet"
        );

        Ok(wallet)
    }

    /// Current balance; users without a wallet row have an empty wallet.
    pub async fn balance(&self, user_id: Uuid) -> BillingResult<Wallet> {
        let wallet: Option<Wallet> = sqlx::query_as(
            "SELECT user_id, balance, lifetime_earned FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet.unwrap_or(Wallet {
            user_id,
            balance: 0,
            lifetime_earned: 0,
        }))
    }

    /// Ledger history, newest first.
    pub async fn history(&self, user_id: Uuid, limit: i64) -> BillingResult<Vec<WalletTransaction>> {
        let rows: Vec<WalletTransaction> = sqlx::query_as(
            "SELECT id, user_id, amount, reason, subscription_id, created_at \
             FROM wallet_transactions \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
