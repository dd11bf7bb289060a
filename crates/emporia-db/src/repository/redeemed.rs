//! # Redeemed Voucher Repository
//!
//! Database operations for single-use redeemed voucher instances.
//!
//! ## Consumption Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  is_used is NEVER read-then-written.                                    │
//! │                                                                         │
//! │  consume:  UPDATE ... SET is_used = 1 WHERE id = ? AND is_used = 0      │
//! │  restore:  UPDATE ... SET is_used = 0 WHERE id = ? AND is_used = 1      │
//! │                                                                         │
//! │  rows_affected = 0 → AlreadyUsed (consume) / nothing-to-restore.       │
//! │  Double-spend from concurrent sessions loses the race here, not in     │
//! │  application code.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporia_core::RedeemedVoucher;

const REDEEMED_COLUMNS: &str = "id, user_id, voucher_code, original_code, kind, value, \
     max_discount, min_order, target_category, valid_until, description, icon, \
     is_used, redeemed_at";

/// Repository for redeemed voucher instance operations.
#[derive(Debug, Clone)]
pub struct RedeemedVoucherRepository {
    pool: SqlitePool,
}

impl RedeemedVoucherRepository {
    /// Creates a new RedeemedVoucherRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RedeemedVoucherRepository { pool }
    }

    /// Resolves an instance code for its owner.
    ///
    /// Instances are never shared across users and never resolved from
    /// the definition table, so both the code and the owner must match.
    pub async fn get_for_user(
        &self,
        voucher_code: &str,
        user_id: &str,
    ) -> DbResult<Option<RedeemedVoucher>> {
        let instance: Option<RedeemedVoucher> = sqlx::query_as(&format!(
            "SELECT {REDEEMED_COLUMNS} FROM redeemed_vouchers \
             WHERE voucher_code = ?1 AND user_id = ?2"
        ))
        .bind(voucher_code)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(instance)
    }

    /// Gets an instance by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RedeemedVoucher>> {
        let instance: Option<RedeemedVoucher> = sqlx::query_as(&format!(
            "SELECT {REDEEMED_COLUMNS} FROM redeemed_vouchers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(instance)
    }

    /// Lists a user's instances, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<RedeemedVoucher>> {
        let instances: Vec<RedeemedVoucher> = sqlx::query_as(&format!(
            "SELECT {REDEEMED_COLUMNS} FROM redeemed_vouchers \
             WHERE user_id = ?1 ORDER BY redeemed_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(instances)
    }

    /// Lists a user's unused instances, newest first (checkout display).
    pub async fn list_unused_for_user(&self, user_id: &str) -> DbResult<Vec<RedeemedVoucher>> {
        let instances: Vec<RedeemedVoucher> = sqlx::query_as(&format!(
            "SELECT {REDEEMED_COLUMNS} FROM redeemed_vouchers \
             WHERE user_id = ?1 AND is_used = 0 ORDER BY redeemed_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(instances)
    }

    /// Mints an instance by spending points, atomically.
    ///
    /// ## What This Does (single transaction)
    /// 1. Conditionally debits `points_cost` from the user's spendable
    ///    balance (`WHERE points >= cost`; `total_points` untouched)
    /// 2. Inserts the instance with its snapshot fields, unused
    ///
    /// ## Returns
    /// `PreconditionFailed` when the balance is too low; the engine maps
    /// that to `InsufficientPoints`. Nothing is written in that case.
    pub async fn mint(&self, instance: &RedeemedVoucher, points_cost: i64) -> DbResult<()> {
        debug!(
            user_id = %instance.user_id,
            voucher_code = %instance.voucher_code,
            points_cost,
            "Minting redeemed voucher"
        );

        let mut tx = self.pool.begin().await?;

        let debit = sqlx::query(
            r#"
            UPDATE users SET points = points - ?2
            WHERE user_id = ?1 AND points >= ?2
            "#,
        )
        .bind(&instance.user_id)
        .bind(points_cost)
        .execute(&mut *tx)
        .await?;

        if debit.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::precondition("User", &instance.user_id));
        }

        sqlx::query(
            r#"
            INSERT INTO redeemed_vouchers (
                id, user_id, voucher_code, original_code, kind, value,
                max_discount, min_order, target_category, valid_until,
                description, icon, is_used, redeemed_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14
            )
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.user_id)
        .bind(&instance.voucher_code)
        .bind(&instance.original_code)
        .bind(instance.kind)
        .bind(instance.value)
        .bind(instance.max_discount)
        .bind(instance.min_order)
        .bind(&instance.target_category)
        .bind(instance.valid_until)
        .bind(&instance.description)
        .bind(&instance.icon)
        .bind(instance.is_used)
        .bind(instance.redeemed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Marks an instance used, exactly once.
    ///
    /// ## Returns
    /// `PreconditionFailed` when the instance is already used (or
    /// unknown); the engine maps that to `AlreadyUsed`. Consuming twice
    /// must fail, never silently succeed.
    pub async fn consume(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE redeemed_vouchers SET is_used = 1 WHERE id = ?1 AND is_used = 0",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::precondition("RedeemedVoucher", id));
        }

        debug!(id = %id, "Redeemed voucher consumed");
        Ok(())
    }

    /// Reverses a consume, exactly once (order cancellation).
    ///
    /// ## Returns
    /// `PreconditionFailed` when the instance is not currently used:
    /// restoring an unconsumed instance would mint value from nothing.
    pub async fn restore(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE redeemed_vouchers SET is_used = 0 WHERE id = ?1 AND is_used = 1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::precondition("RedeemedVoucher", id));
        }

        debug!(id = %id, "Redeemed voucher restored");
        Ok(())
    }

    /// Purges expired, unused instances from the visible inventory.
    ///
    /// Advisory/display-only cleanup: instances referenced by an active,
    /// non-cancelled order are excluded, and nothing here is load-bearing
    /// for correctness. Safe to run concurrently with everything else.
    ///
    /// ## Returns
    /// Number of instances removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM redeemed_vouchers
            WHERE is_used = 0
              AND valid_until IS NOT NULL
              AND valid_until < ?1
              AND voucher_code NOT IN (
                  SELECT voucher_code FROM orders
                  WHERE voucher_code IS NOT NULL
                    AND status NOT IN ('cancelled', 'refunded')
              )
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            debug!(purged, "Purged expired redeemed vouchers");
        }
        Ok(purged)
    }
}
