//! # Reward Ledger Repository
//!
//! Database operations for the reward-point fields of the user record.
//!
//! ## Balance Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Point balances are NEVER read-then-written.                            │
//! │                                                                         │
//! │  credit:  points = points + n, total_points = total_points + n         │
//! │  debit:   points = MAX(0, points - n),                                  │
//! │           total_points = MAX(0, total_points - n)                       │
//! │                                                                         │
//! │  The floor at zero means a refund can never push a user negative       │
//! │  even if other activity already reduced the balance in between.        │
//! │  (The conditional spend for redemptions lives in the redeemed          │
//! │  voucher repository, inside the minting transaction.)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporia_core::UserRewardState;

/// Repository for reward point operations.
#[derive(Debug, Clone)]
pub struct RewardRepository {
    pool: SqlitePool,
}

impl RewardRepository {
    /// Creates a new RewardRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RewardRepository { pool }
    }

    /// Gets a user's reward state.
    pub async fn get_state(&self, user_id: &str) -> DbResult<Option<UserRewardState>> {
        let state: Option<UserRewardState> = sqlx::query_as(
            "SELECT user_id, points, total_points FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    /// Ensures a user row exists with zero balances.
    ///
    /// The wider user profile lives with the external collaborator; this
    /// engine only needs the point fields.
    pub async fn ensure_user(&self, user_id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (user_id, points, total_points, created_at)
            VALUES (?1, 0, 0, ?2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically credits earned points to both balances.
    ///
    /// Called as the last step of order placement: a failed order must
    /// leave no dangling reward side effects.
    pub async fn credit(&self, user_id: &str, points: i64) -> DbResult<()> {
        if points <= 0 {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE users SET
                points = points + ?2,
                total_points = total_points + ?2
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .bind(points)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }

        debug!(user_id = %user_id, points, "Reward points credited");
        Ok(())
    }

    /// Atomically debits points from both balances, floored at zero.
    ///
    /// Called on order cancellation with the order's *persisted*
    /// `earned_points`, never a recomputed value.
    pub async fn debit_floored(&self, user_id: &str, points: i64) -> DbResult<()> {
        if points <= 0 {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE users SET
                points = MAX(0, points - ?2),
                total_points = MAX(0, total_points - ?2)
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .bind(points)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }

        debug!(user_id = %user_id, points, "Reward points debited");
        Ok(())
    }

    /// Lists all customer reward states (admin surface).
    pub async fn list(&self) -> DbResult<Vec<UserRewardState>> {
        let states: Vec<UserRewardState> = sqlx::query_as(
            "SELECT user_id, points, total_points FROM users ORDER BY total_points DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(states)
    }
}
