//! # Order Lifecycle Controller
//!
//! Cancellation with exactly-once reversal, admin status overrides, and
//! order listings.
//!
//! ## Cancellation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cancel(user, order)                                                    │
//! │                                                                         │
//! │  1. Atomic status transition: UPDATE ... WHERE status IN                │
//! │     (pending, confirmed, processing, shipping)                          │
//! │       │                                                                 │
//! │       ├─ 0 rows, live status = cancelled ──► no-op, return Ok           │
//! │       ├─ 0 rows, anything else          ──► InvalidTransition           │
//! │       │                                                                 │
//! │       ▼ transition won                                                  │
//! │  2. Reversal, exactly once:                                             │
//! │     • restore the consumed instance (if any)                            │
//! │     • decrement the definition's used_count, bounded at zero            │
//! │     • debit the order's PERSISTED earned_points, floored at zero        │
//! │                                                                         │
//! │  Concurrent cancels race on step 1; only the winner reaches step 2.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Admin overrides re-enter the same transition rules: one forward step
//! along the success chain, cancel from non-terminal, refund from
//! cancelled, nothing else.

use tracing::{info, warn};

use emporia_core::voucher::is_instance_code;
use emporia_core::{CoreError, Order, OrderItem, OrderStatus};
use emporia_db::{Database, DbError};

use crate::config::StoreConfig;
use crate::error::{EngineError, EngineResult};
use crate::retry::{with_retries, with_retries_db};

/// The states a cancel request may find the order in.
const CANCELLABLE: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Shipping,
];

/// Order lifecycle transitions and listings.
#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    config: StoreConfig,
}

impl OrderService {
    /// Creates a new order service.
    pub fn new(db: Database, config: StoreConfig) -> Self {
        OrderService { db, config }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order for its owner. Another user's order is reported as
    /// not found, never as someone else's order.
    pub async fn get_for_user(&self, user_id: &str, order_id: &str) -> EngineResult<Order> {
        let order = self.fetch(order_id).await?;
        if order.user_id != user_id {
            return Err(CoreError::OrderNotFound(order_id.to_string()).into());
        }
        Ok(order)
    }

    /// Gets an order without an ownership check (admin surface).
    pub async fn get(&self, order_id: &str) -> EngineResult<Order> {
        self.fetch(order_id).await
    }

    /// Gets an order's frozen line items.
    pub async fn items(&self, order_id: &str) -> EngineResult<Vec<OrderItem>> {
        Ok(self.db.orders().get_items(order_id).await?)
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> EngineResult<Vec<Order>> {
        Ok(self.db.orders().list_for_user(user_id).await?)
    }

    /// Lists all orders, newest first (admin surface).
    pub async fn list_all(&self) -> EngineResult<Vec<Order>> {
        Ok(self.db.orders().list_all().await?)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels an order on behalf of its owner.
    ///
    /// Idempotent: cancelling an already-cancelled order is a no-op that
    /// returns the order unchanged. Any other terminal state rejects with
    /// `InvalidTransition`. The reversal runs exactly once, gated by the
    /// atomic status transition.
    pub async fn cancel(&self, user_id: &str, order_id: &str) -> EngineResult<Order> {
        let order = self.get_for_user(user_id, order_id).await?;
        self.cancel_inner(order).await
    }

    /// Cancels an order without an ownership check (admin surface).
    pub async fn cancel_as_admin(&self, order_id: &str) -> EngineResult<Order> {
        let order = self.fetch(order_id).await?;
        self.cancel_inner(order).await
    }

    async fn cancel_inner(&self, order: Order) -> EngineResult<Order> {
        if order.status == OrderStatus::Cancelled {
            // Second cancel: nothing happens, nothing reverses
            return Ok(order);
        }

        let orders = self.db.orders();
        match with_retries_db(self.config.retry_limit, || {
            orders.transition(&order.id, &CANCELLABLE, OrderStatus::Cancelled)
        })
        .await
        {
            Ok(()) => {}
            Err(DbError::PreconditionFailed { .. }) => {
                // Lost a race; report what the order actually is now
                let live = self.fetch(&order.id).await?;
                if live.status == OrderStatus::Cancelled {
                    return Ok(live);
                }
                return Err(CoreError::InvalidTransition {
                    from: live.status,
                    to: OrderStatus::Cancelled,
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        }

        // Only the request that won the transition reaches this point
        self.reverse(&order).await?;

        info!(order_id = %order.id, user_id = %order.user_id, "Order cancelled");
        self.fetch(&order.id).await
    }

    /// Reverses the placement side effects of a freshly-cancelled order.
    ///
    /// The status transition has already committed when this runs, so a
    /// transient storage conflict here must not surface as a permanent
    /// failure: every reversal step goes through the retry helper.
    async fn reverse(&self, order: &Order) -> EngineResult<()> {
        if let Some(code) = &order.voucher_code {
            if is_instance_code(code) {
                match self.db.redeemed().get_for_user(code, &order.user_id).await? {
                    Some(instance) => {
                        let redeemed = self.db.redeemed();
                        match with_retries_db(self.config.retry_limit, || {
                            redeemed.restore(&instance.id)
                        })
                        .await
                        {
                            Ok(()) => {}
                            // Already unused: nothing to give back
                            Err(DbError::PreconditionFailed { .. }) => {
                                warn!(code = %code, "Instance was not consumed, skipping restore");
                            }
                            Err(err) => return Err(err.into()),
                        }
                    }
                    // Purged or gone; the cancel still proceeds
                    None => warn!(code = %code, "Consumed instance no longer exists"),
                }
            } else {
                // Bounded at zero inside the repository
                let vouchers = self.db.vouchers();
                with_retries(self.config.retry_limit, || vouchers.decrement_used(code)).await?;
            }
        }

        // The PERSISTED earned_points, never a recomputation
        let rewards = self.db.rewards();
        with_retries(self.config.retry_limit, || {
            rewards.debit_floored(&order.user_id, order.earned_points)
        })
        .await?;

        Ok(())
    }

    // =========================================================================
    // Admin Override
    // =========================================================================

    /// Manually moves an order to `to`, re-entering the normal transition
    /// rules. An override into `Cancelled` performs the full reversal.
    pub async fn override_status(&self, order_id: &str, to: OrderStatus) -> EngineResult<Order> {
        if to == OrderStatus::Cancelled {
            return self.cancel_as_admin(order_id).await;
        }

        let order = self.fetch(order_id).await?;
        if !order.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                from: order.status,
                to,
            }
            .into());
        }

        let orders = self.db.orders();
        let allowed_from = [order.status];
        match with_retries_db(self.config.retry_limit, || {
            orders.transition(order_id, &allowed_from, to)
        })
        .await
        {
            Ok(()) => {}
            Err(DbError::PreconditionFailed { .. }) => {
                let live = self.fetch(order_id).await?;
                return Err(CoreError::InvalidTransition {
                    from: live.status,
                    to,
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        }

        info!(order_id = %order_id, to = to.as_str(), "Order status overridden");
        self.fetch(order_id).await
    }

    async fn fetch(&self, order_id: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }
}

// =============================================================================
// Service Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutService;
    use crate::config::StoreConfig;
    use crate::error::ErrorCode;
    use crate::tiers::TierService;
    use crate::vouchers::{VoucherInput, VoucherService};
    use emporia_core::{CartLine, VoucherKind};
    use emporia_db::DbConfig;

    struct Stack {
        db: Database,
        checkout: CheckoutService,
        orders: OrderService,
        vouchers: VoucherService,
    }

    async fn setup() -> Stack {
        // RUST_LOG=debug surfaces the repository traces when a test fails
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tiers = TierService::new(db.clone());
        let vouchers = VoucherService::new(db.clone());
        let checkout = CheckoutService::new(
            db.clone(),
            StoreConfig::default(),
            tiers,
            vouchers.clone(),
        );
        let orders = OrderService::new(db.clone(), StoreConfig::default());
        Stack {
            db,
            checkout,
            orders,
            vouchers,
        }
    }

    fn cart() -> Vec<CartLine> {
        vec![CartLine {
            product_id: "p1".to_string(),
            quantity: 3,
            unit_price: 100_000,
            category: "coffee".to_string(),
        }]
    }

    fn fixed_voucher(code: &str, public: bool, points_cost: i64) -> VoucherInput {
        VoucherInput {
            code: code.to_string(),
            kind: VoucherKind::Fixed,
            value: 30_000,
            max_discount: None,
            min_order: None,
            usage_limit: None,
            target_user_id: None,
            target_category: None,
            valid_from: None,
            valid_until: None,
            is_public: public,
            points_cost,
            icon: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_cancel_reverses_exactly_what_was_granted() {
        let stack = setup().await;
        stack
            .vouchers
            .create_definition(fixed_voucher("THIRTY", true, 0))
            .await
            .unwrap();

        let order = stack
            .checkout
            .place("u-1", &cart(), Some("THIRTY"))
            .await
            .unwrap();
        assert_eq!(order.earned_points, 30);

        let before = stack.db.rewards().get_state("u-1").await.unwrap().unwrap();
        assert_eq!(before.points, 30);

        let cancelled = stack.orders.cancel("u-1", &order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        // Points back to exactly where they were before placement
        let after = stack.db.rewards().get_state("u-1").await.unwrap().unwrap();
        assert_eq!(after.points, 0);
        assert_eq!(after.total_points, 0);

        // Definition usage counter released
        let def = stack
            .db
            .vouchers()
            .get_by_code("THIRTY")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(def.used_count, 0);
    }

    #[tokio::test]
    async fn test_double_cancel_is_a_noop() {
        let stack = setup().await;
        let order = stack.checkout.place("u-1", &cart(), None).await.unwrap();

        stack.orders.cancel("u-1", &order.id).await.unwrap();
        let after_first = stack.db.rewards().get_state("u-1").await.unwrap().unwrap();

        // Second cancel succeeds without reversing anything again
        let second = stack.orders.cancel("u-1", &order.id).await.unwrap();
        assert_eq!(second.status, OrderStatus::Cancelled);
        let after_second = stack.db.rewards().get_state("u-1").await.unwrap().unwrap();
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_cancel_restores_instance_for_reuse() {
        let stack = setup().await;
        stack
            .vouchers
            .create_definition(fixed_voucher("REWARD", false, 10))
            .await
            .unwrap();
        stack.db.rewards().ensure_user("u-1").await.unwrap();
        stack.db.rewards().credit("u-1", 10).await.unwrap();
        let instance = stack.vouchers.redeem("u-1", "REWARD").await.unwrap();

        let order = stack
            .checkout
            .place("u-1", &cart(), Some(&instance.voucher_code))
            .await
            .unwrap();
        stack.orders.cancel("u-1", &order.id).await.unwrap();

        // The instance is usable again after the cancel
        let restored = stack
            .db
            .redeemed()
            .get_by_id(&instance.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!restored.is_used);

        stack
            .checkout
            .place("u-1", &cart(), Some(&instance.voucher_code))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_requires_ownership() {
        let stack = setup().await;
        let order = stack.checkout.place("u-1", &cart(), None).await.unwrap();

        let err = stack.orders.cancel("u-2", &order.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_override_walks_the_chain_and_rejects_skips() {
        let stack = setup().await;
        let order = stack.checkout.place("u-1", &cart(), None).await.unwrap();

        // Skipping ahead is rejected
        let err = stack
            .orders
            .override_status(&order.id, OrderStatus::Shipping)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);

        // One step at a time works
        for to in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipping,
            OrderStatus::Delivered,
        ] {
            let updated = stack.orders.override_status(&order.id, to).await.unwrap();
            assert_eq!(updated.status, to);
        }

        // Delivered is terminal: no cancel anymore
        let err = stack.orders.cancel("u-1", &order.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);
    }

    #[tokio::test]
    async fn test_refund_only_after_cancel() {
        let stack = setup().await;
        let order = stack.checkout.place("u-1", &cart(), None).await.unwrap();

        let err = stack
            .orders
            .override_status(&order.id, OrderStatus::Refunded)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);

        stack.orders.cancel("u-1", &order.id).await.unwrap();
        let refunded = stack
            .orders
            .override_status(&order.id, OrderStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn test_admin_override_into_cancelled_reverses() {
        let stack = setup().await;
        let order = stack.checkout.place("u-1", &cart(), None).await.unwrap();

        let cancelled = stack
            .orders
            .override_status(&order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let state = stack.db.rewards().get_state("u-1").await.unwrap().unwrap();
        assert_eq!(state.points, 0);
    }
}
