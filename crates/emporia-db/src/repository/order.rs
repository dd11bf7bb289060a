//! # Order Repository
//!
//! Database operations for orders and their line items.
//!
//! ## The Status Transition Is The Gate
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cancellation correctness hangs on one conditional UPDATE:              │
//! │                                                                         │
//! │    UPDATE orders SET status = 'cancelled', ...                          │
//! │    WHERE id = ? AND status IN (<non-terminal set>)                      │
//! │                                                                         │
//! │  Only the request that wins this update performs the reward/voucher    │
//! │  reversal. A second cancel matches zero rows and reverses nothing.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporia_core::{Order, OrderItem, OrderStatus};

const ORDER_COLUMNS: &str = "id, user_id, status, subtotal, shipping_fee, tier_discount, \
     voucher_discount, total, voucher_code, earned_points, tier_slug, \
     created_at, updated_at, cancelled_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order: Option<Order> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let orders: Vec<Order> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Lists all orders, newest first (admin surface).
    pub async fn list_all(&self) -> DbResult<Vec<Order>> {
        let orders: Vec<Order> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Inserts an order and its line items in one transaction.
    ///
    /// ## Snapshot Pattern
    /// Line items carry price-at-purchase copies; the order carries the
    /// full pricing breakdown and `earned_points`, immune to later
    /// catalog, tier or formula changes.
    pub async fn insert_order(&self, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        debug!(id = %order.id, user_id = %order.user_id, total = order.total, "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, status, subtotal, shipping_fee,
                tier_discount, voucher_discount, total, voucher_code,
                earned_points, tier_slug, created_at, updated_at, cancelled_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13, ?14
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(order.subtotal)
        .bind(order.shipping_fee)
        .bind(order.tier_discount)
        .bind(order.voucher_discount)
        .bind(order.total)
        .bind(&order.voucher_code)
        .bind(order.earned_points)
        .bind(&order.tier_slug)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.cancelled_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, quantity, unit_price,
                    category, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(&item.category)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets all line items for an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items: Vec<OrderItem> = sqlx::query_as(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price,
                   category, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Atomically moves an order to `to`, gated on its current status.
    ///
    /// ## Arguments
    /// * `allowed_from` - The statuses the order must currently be in;
    ///   the transition only happens if the live row still matches one
    ///
    /// ## Returns
    /// `PreconditionFailed` when the order is no longer in any allowed
    /// status (lost race, double cancel, illegal override). The engine
    /// maps that to `InvalidTransition` with the live status.
    pub async fn transition(
        &self,
        order_id: &str,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> DbResult<()> {
        if allowed_from.is_empty() {
            return Err(DbError::precondition("Order", order_id));
        }

        let placeholders = allowed_from
            .iter()
            .enumerate()
            // ?1 = id, ?2 = to, ?3 = now; the set starts at ?4
            .map(|(i, _)| format!("?{}", i + 4))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "UPDATE orders SET status = ?2, updated_at = ?3, \
             cancelled_at = CASE WHEN ?2 = 'cancelled' THEN ?3 ELSE cancelled_at END \
             WHERE id = ?1 AND status IN ({placeholders})"
        );

        let now = Utc::now();
        let mut query = sqlx::query(&sql).bind(order_id).bind(to).bind(now);
        for from in allowed_from {
            query = query.bind(*from);
        }

        let result = query.execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::precondition("Order", order_id));
        }

        debug!(order_id = %order_id, to = to.as_str(), "Order status transitioned");
        Ok(())
    }
}
