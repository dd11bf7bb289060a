//! # Voucher Definition Repository
//!
//! Database operations for voucher definitions, including the atomic
//! usage-counter updates.
//!
//! ## Usage Counter Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  used_count is NEVER read-then-written.                                 │
//! │                                                                         │
//! │  increment:  UPDATE ... SET used_count = used_count + 1                 │
//! │              WHERE code = ? AND (usage_limit IS NULL                    │
//! │                                  OR used_count < usage_limit)           │
//! │                                                                         │
//! │  decrement:  UPDATE ... SET used_count = used_count - 1                 │
//! │              WHERE code = ? AND used_count > 0                          │
//! │                                                                         │
//! │  rows_affected = 0 means the precondition no longer holds; the          │
//! │  engine maps that to UsageExhausted (or ignores it for the bounded      │
//! │  decrement on cancellation).                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporia_core::VoucherDefinition;

const VOUCHER_COLUMNS: &str = "code, kind, value, max_discount, min_order, usage_limit, \
     used_count, target_user_id, target_category, valid_from, valid_until, \
     is_public, points_cost, icon, description, created_at, updated_at";

/// Repository for voucher definition database operations.
#[derive(Debug, Clone)]
pub struct VoucherRepository {
    pool: SqlitePool,
}

impl VoucherRepository {
    /// Creates a new VoucherRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VoucherRepository { pool }
    }

    /// Gets a definition by exact code match.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<VoucherDefinition>> {
        let voucher: Option<VoucherDefinition> = sqlx::query_as(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM voucher_definitions WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    /// Lists all definitions, newest first (admin surface).
    pub async fn list(&self) -> DbResult<Vec<VoucherDefinition>> {
        let vouchers: Vec<VoucherDefinition> = sqlx::query_as(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM voucher_definitions ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(vouchers)
    }

    /// Lists homepage-visible public definitions.
    pub async fn list_public(&self) -> DbResult<Vec<VoucherDefinition>> {
        let vouchers: Vec<VoucherDefinition> = sqlx::query_as(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM voucher_definitions \
             WHERE is_public = 1 ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(vouchers)
    }

    /// Lists definitions obtainable by spending points.
    pub async fn list_redeemable(&self) -> DbResult<Vec<VoucherDefinition>> {
        let vouchers: Vec<VoucherDefinition> = sqlx::query_as(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM voucher_definitions \
             WHERE points_cost > 0 ORDER BY points_cost"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(vouchers)
    }

    /// Inserts a definition.
    pub async fn insert(&self, voucher: &VoucherDefinition) -> DbResult<()> {
        debug!(code = %voucher.code, kind = ?voucher.kind, "Inserting voucher definition");

        sqlx::query(
            r#"
            INSERT INTO voucher_definitions (
                code, kind, value, max_discount, min_order, usage_limit,
                used_count, target_user_id, target_category, valid_from,
                valid_until, is_public, points_cost, icon, description,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15,
                ?16, ?17
            )
            "#,
        )
        .bind(&voucher.code)
        .bind(voucher.kind)
        .bind(voucher.value)
        .bind(voucher.max_discount)
        .bind(voucher.min_order)
        .bind(voucher.usage_limit)
        .bind(voucher.used_count)
        .bind(&voucher.target_user_id)
        .bind(&voucher.target_category)
        .bind(voucher.valid_from)
        .bind(voucher.valid_until)
        .bind(voucher.is_public)
        .bind(voucher.points_cost)
        .bind(&voucher.icon)
        .bind(&voucher.description)
        .bind(voucher.created_at)
        .bind(voucher.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates the rule fields of a definition.
    ///
    /// `used_count` is deliberately excluded: it only moves through the
    /// atomic increment/decrement below.
    pub async fn update(&self, voucher: &VoucherDefinition) -> DbResult<()> {
        debug!(code = %voucher.code, "Updating voucher definition");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE voucher_definitions SET
                kind = ?2,
                value = ?3,
                max_discount = ?4,
                min_order = ?5,
                usage_limit = ?6,
                target_user_id = ?7,
                target_category = ?8,
                valid_from = ?9,
                valid_until = ?10,
                is_public = ?11,
                points_cost = ?12,
                icon = ?13,
                description = ?14,
                updated_at = ?15
            WHERE code = ?1
            "#,
        )
        .bind(&voucher.code)
        .bind(voucher.kind)
        .bind(voucher.value)
        .bind(voucher.max_discount)
        .bind(voucher.min_order)
        .bind(voucher.usage_limit)
        .bind(&voucher.target_user_id)
        .bind(&voucher.target_category)
        .bind(voucher.valid_from)
        .bind(voucher.valid_until)
        .bind(voucher.is_public)
        .bind(voucher.points_cost)
        .bind(&voucher.icon)
        .bind(&voucher.description)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Voucher", &voucher.code));
        }

        Ok(())
    }

    /// Deletes a definition.
    ///
    /// Redeemed instances survive: they carry a full snapshot.
    pub async fn delete(&self, code: &str) -> DbResult<()> {
        debug!(code = %code, "Deleting voucher definition");

        let result = sqlx::query("DELETE FROM voucher_definitions WHERE code = ?1")
            .bind(code)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Voucher", code));
        }

        Ok(())
    }

    /// Atomically increments `used_count`, honoring the usage limit.
    ///
    /// ## Returns
    /// `PreconditionFailed` when the limit is already reached (or the
    /// code vanished); the engine maps that to `UsageExhausted`.
    pub async fn increment_used(&self, code: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE voucher_definitions SET
                used_count = used_count + 1,
                updated_at = ?2
            WHERE code = ?1
              AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(code)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::precondition("Voucher", code));
        }

        debug!(code = %code, "Voucher usage incremented");
        Ok(())
    }

    /// Atomically decrements `used_count`, bounded at zero.
    ///
    /// Used on order cancellation. A count already at zero is not an
    /// error: the reversal is simply a no-op then.
    pub async fn decrement_used(&self, code: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE voucher_definitions SET
                used_count = used_count - 1,
                updated_at = ?2
            WHERE code = ?1 AND used_count > 0
            "#,
        )
        .bind(code)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(code = %code, "Voucher usage decremented");
        Ok(())
    }
}
