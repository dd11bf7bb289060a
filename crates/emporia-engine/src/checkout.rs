//! # Checkout Service
//!
//! Live pricing previews and order placement.
//!
//! ## Placement Side-Effect Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  place(user, cart, code)                                                │
//! │                                                                         │
//! │  1. validate voucher, resolve tier, compose quote   (mutates nothing)  │
//! │  2. insert order + snapshot line items              (one transaction)  │
//! │  3. consume instance / increment used_count         (conditional)      │
//! │       └─ failure ──► void the just-created order, report the reason    │
//! │  4. credit earned points                            (LAST)             │
//! │       └─ failure ──► release the burned voucher, void the order        │
//! │                                                                         │
//! │  The credit/consume steps come after the order exists, so a failed     │
//! │  placement can never mint points or burn a voucher. Step 3 precedes    │
//! │  step 4 so its only rollback is voiding an order nobody has seen.      │
//! │  Either failure leaves no live order, no burned voucher and no         │
//! │  credited points.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use emporia_core::{
    cart_subtotal, compose, CartLine, CoreError, Order, OrderItem, OrderStatus, Quote,
    TierStanding,
};
use emporia_db::{Database, DbError};

use crate::config::StoreConfig;
use crate::error::{EngineError, EngineResult};
use crate::retry::{with_retries, with_retries_db};
use crate::tiers::TierService;
use crate::vouchers::{ValidatedVoucher, VoucherService, VoucherSource};

/// A live pricing preview: what the storefront shows before placement.
#[derive(Debug, Clone)]
pub struct CheckoutPreview {
    pub quote: Quote,
    pub tier: Option<TierStanding>,
    pub voucher: Option<ValidatedVoucher>,
}

/// Pricing previews and order placement.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    db: Database,
    config: StoreConfig,
    tiers: TierService,
    vouchers: VoucherService,
}

impl CheckoutService {
    /// Creates a new checkout service.
    pub fn new(
        db: Database,
        config: StoreConfig,
        tiers: TierService,
        vouchers: VoucherService,
    ) -> Self {
        CheckoutService {
            db,
            config,
            tiers,
            vouchers,
        }
    }

    /// Prices a cart without touching any persisted state.
    ///
    /// A rejected voucher fails the whole preview with its specific
    /// reason; it is never silently dropped from the quote.
    pub async fn preview(
        &self,
        user_id: &str,
        cart: &[CartLine],
        voucher_code: Option<&str>,
    ) -> EngineResult<CheckoutPreview> {
        if cart.is_empty() {
            return Err(EngineError::validation("cart is empty"));
        }

        let subtotal = cart_subtotal(cart);
        let tier = self.tiers.standing_for_user(user_id).await?;

        let voucher = match voucher_code {
            Some(code) => Some(self.vouchers.validate(user_id, code, cart, subtotal).await?),
            None => None,
        };

        let quote = compose(
            subtotal,
            tier.as_ref().map(|s| &s.tier),
            voucher.as_ref().map(|v| &v.rule),
            &self.config.pricing,
        );

        Ok(CheckoutPreview {
            quote,
            tier,
            voucher,
        })
    }

    /// Places an order for a cart.
    ///
    /// See the module docs for the side-effect ordering. Returns the
    /// persisted order, status `Pending`.
    pub async fn place(
        &self,
        user_id: &str,
        cart: &[CartLine],
        voucher_code: Option<&str>,
    ) -> EngineResult<Order> {
        self.db.rewards().ensure_user(user_id).await?;

        let preview = self.preview(user_id, cart, voucher_code).await?;
        let quote = preview.quote;
        let now = Utc::now();

        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: OrderStatus::Pending,
            subtotal: quote.subtotal,
            shipping_fee: quote.shipping_fee,
            tier_discount: quote.tier_discount,
            voucher_discount: quote.voucher_discount,
            total: quote.total,
            voucher_code: preview.voucher.as_ref().map(|v| v.code().to_string()),
            earned_points: quote.earned_points,
            tier_slug: preview.tier.as_ref().map(|s| s.tier.slug.clone()),
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };

        let items: Vec<OrderItem> = cart
            .iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                category: line.category.clone(),
                created_at: now,
            })
            .collect();

        let orders = self.db.orders();
        with_retries(self.config.retry_limit, || {
            orders.insert_order(&order, &items)
        })
        .await?;

        // The voucher burn runs before the point credit: if it fails,
        // the only thing to unwind is an order nobody has seen yet
        if let Some(voucher) = &preview.voucher {
            if let Err(err) = self.apply_voucher(voucher).await {
                self.void_order(&order.id).await;
                return Err(err);
            }
        }

        let rewards = self.db.rewards();
        let credited = with_retries(self.config.retry_limit, || {
            rewards.credit(user_id, quote.earned_points)
        })
        .await;
        if let Err(err) = credited {
            // A later cancel must not debit points that were never
            // granted, so the placement unwinds in full
            if let Some(voucher) = &preview.voucher {
                self.release_voucher(voucher).await;
            }
            self.void_order(&order.id).await;
            return Err(err);
        }

        info!(
            order_id = %order.id,
            user_id = %user_id,
            total = quote.total,
            earned_points = quote.earned_points,
            voucher = ?order.voucher_code,
            "Order placed"
        );
        Ok(order)
    }

    /// Burns the validated voucher for a just-persisted order.
    async fn apply_voucher(&self, voucher: &ValidatedVoucher) -> EngineResult<()> {
        match &voucher.source {
            VoucherSource::Instance { id, code } => {
                let redeemed = self.db.redeemed();
                match with_retries_db(self.config.retry_limit, || redeemed.consume(id)).await {
                    Ok(()) => Ok(()),
                    // Lost a double-spend race since validation
                    Err(DbError::PreconditionFailed { .. }) => {
                        Err(CoreError::AlreadyUsed(code.clone()).into())
                    }
                    Err(err) => Err(err.into()),
                }
            }
            VoucherSource::Definition { code } => {
                let vouchers = self.db.vouchers();
                match with_retries_db(self.config.retry_limit, || vouchers.increment_used(code))
                    .await
                {
                    Ok(()) => Ok(()),
                    // The cap filled up since validation
                    Err(DbError::PreconditionFailed { .. }) => Err(CoreError::UsageExhausted {
                        code: code.clone(),
                    }
                    .into()),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Best-effort release of a burned voucher whose order is being
    /// unwound. The exact inverse of [`Self::apply_voucher`].
    async fn release_voucher(&self, voucher: &ValidatedVoucher) {
        let result = match &voucher.source {
            VoucherSource::Instance { id, .. } => self.db.redeemed().restore(id).await,
            VoucherSource::Definition { code } => self.db.vouchers().decrement_used(code).await,
        };
        if let Err(err) = result {
            warn!(
                code = %voucher.code(),
                error = %err,
                "Failed to release voucher while unwinding placement"
            );
        }
    }

    /// Best-effort voiding of an order whose voucher burn failed.
    ///
    /// Nothing has been credited or consumed at this point, so voiding
    /// is just the status flip; there is nothing to reverse.
    async fn void_order(&self, order_id: &str) {
        let result = self
            .db
            .orders()
            .transition(order_id, &[OrderStatus::Pending], OrderStatus::Cancelled)
            .await;
        if let Err(err) = result {
            warn!(order_id = %order_id, error = %err, "Failed to void order after voucher failure");
        }
    }
}

// =============================================================================
// Service Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::TierInput;
    use crate::vouchers::VoucherInput;
    use emporia_core::VoucherKind;
    use emporia_db::DbConfig;

    async fn setup() -> (Database, CheckoutService, TierService, VoucherService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tiers = TierService::new(db.clone());
        let vouchers = VoucherService::new(db.clone());
        let checkout = CheckoutService::new(
            db.clone(),
            StoreConfig::default(),
            tiers.clone(),
            vouchers.clone(),
        );
        (db, checkout, tiers, vouchers)
    }

    fn cart() -> Vec<CartLine> {
        vec![
            CartLine {
                product_id: "p1".to_string(),
                quantity: 2,
                unit_price: 100_000,
                category: "coffee".to_string(),
            },
            CartLine {
                product_id: "p2".to_string(),
                quantity: 1,
                unit_price: 100_000,
                category: "coffee".to_string(),
            },
        ]
    }

    fn percent_voucher(code: &str) -> VoucherInput {
        VoucherInput {
            code: code.to_string(),
            kind: VoucherKind::Percent,
            value: 10,
            max_discount: Some(25_000),
            min_order: None,
            usage_limit: None,
            target_user_id: None,
            target_category: None,
            valid_from: None,
            valid_until: None,
            is_public: true,
            points_cost: 0,
            icon: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_preview_composes_tier_and_voucher() {
        let (_db, checkout, tiers, vouchers) = setup().await;

        tiers
            .create(TierInput {
                slug: "bronze".to_string(),
                name: "Bronze".to_string(),
                min_points: 0,
                discount_percent: 5,
                free_shipping_threshold: None,
                icon: None,
                benefits: vec![],
            })
            .await
            .unwrap();
        vouchers
            .create_definition(percent_voucher("TEN"))
            .await
            .unwrap();

        // subtotal 300,000: below threshold so shipping 20,000;
        // tier 5% = 15,000; voucher 10% = 30,000 capped at 25,000
        let preview = checkout
            .preview("u-1", &cart(), Some("TEN"))
            .await
            .unwrap();
        assert_eq!(preview.quote.subtotal, 300_000);
        assert_eq!(preview.quote.shipping_fee, 20_000);
        assert_eq!(preview.quote.tier_discount, 15_000);
        assert_eq!(preview.quote.voucher_discount, 25_000);
        assert_eq!(preview.quote.total, 280_000);
        assert_eq!(preview.quote.earned_points, 30);
        assert_eq!(preview.tier.as_ref().unwrap().tier.slug, "bronze");
    }

    #[tokio::test]
    async fn test_preview_surfaces_voucher_rejection() {
        let (_db, checkout, _tiers, vouchers) = setup().await;
        let mut voucher = percent_voucher("BIG");
        voucher.min_order = Some(1_000_000);
        vouchers.create_definition(voucher).await.unwrap();

        let err = checkout
            .preview("u-1", &cart(), Some("BIG"))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::MinOrderNotMet);
    }

    #[tokio::test]
    async fn test_place_persists_snapshot_and_credits_last() {
        let (db, checkout, _tiers, vouchers) = setup().await;
        vouchers
            .create_definition(percent_voucher("TEN"))
            .await
            .unwrap();

        let order = checkout.place("u-1", &cart(), Some("TEN")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.voucher_code.as_deref(), Some("TEN"));
        assert_eq!(order.earned_points, 30);

        // Line items frozen
        let items = db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unit_price, 100_000);

        // Points credited to both balances
        let state = db.rewards().get_state("u-1").await.unwrap().unwrap();
        assert_eq!(state.points, 30);
        assert_eq!(state.total_points, 30);

        // Definition usage counted
        let def = db.vouchers().get_by_code("TEN").await.unwrap().unwrap();
        assert_eq!(def.used_count, 1);
    }

    #[tokio::test]
    async fn test_place_consumes_instance_exactly_once() {
        let (db, checkout, _tiers, vouchers) = setup().await;
        let mut private = percent_voucher("REWARD");
        private.is_public = false;
        private.points_cost = 10;
        vouchers.create_definition(private).await.unwrap();

        db.rewards().ensure_user("u-1").await.unwrap();
        db.rewards().credit("u-1", 10).await.unwrap();
        let instance = vouchers.redeem("u-1", "REWARD").await.unwrap();

        let order = checkout
            .place("u-1", &cart(), Some(&instance.voucher_code))
            .await
            .unwrap();
        assert_eq!(order.voucher_code.as_deref(), Some(instance.voucher_code.as_str()));

        // The instance is burned: applying it again resolves nothing
        let err = checkout
            .place("u-1", &cart(), Some(&instance.voucher_code))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_instance_consumes_exactly_once() {
        let (db, checkout, _tiers, vouchers) = setup().await;
        let mut private = percent_voucher("REWARD");
        private.is_public = false;
        private.points_cost = 10;
        vouchers.create_definition(private).await.unwrap();

        db.rewards().ensure_user("u-1").await.unwrap();
        db.rewards().credit("u-1", 10).await.unwrap();
        let instance = vouchers.redeem("u-1", "REWARD").await.unwrap();

        // Restoring an instance that was never consumed must fail: it
        // would mint voucher value from nothing
        let err = db.redeemed().restore(&instance.id).await.unwrap_err();
        assert!(matches!(err, DbError::PreconditionFailed { .. }));

        let validated = vouchers
            .validate("u-1", &instance.voucher_code, &cart(), cart_subtotal(&cart()))
            .await
            .unwrap();

        // First consume wins; the second fails, never silently succeeds
        db.redeemed().consume(&instance.id).await.unwrap();
        let err = db.redeemed().consume(&instance.id).await.unwrap_err();
        assert!(matches!(err, DbError::PreconditionFailed { .. }));

        // A burn that lost that race reports the instance as already used
        let err = checkout.apply_voucher(&validated).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::AlreadyUsed);
    }

    #[tokio::test]
    async fn test_release_is_the_inverse_of_the_burn() {
        let (db, checkout, _tiers, vouchers) = setup().await;
        vouchers
            .create_definition(percent_voucher("TEN"))
            .await
            .unwrap();

        // Definition: the usage counter goes up and comes back down
        let validated = vouchers
            .validate("u-1", "TEN", &cart(), cart_subtotal(&cart()))
            .await
            .unwrap();
        checkout.apply_voucher(&validated).await.unwrap();
        let def = db.vouchers().get_by_code("TEN").await.unwrap().unwrap();
        assert_eq!(def.used_count, 1);

        checkout.release_voucher(&validated).await;
        let def = db.vouchers().get_by_code("TEN").await.unwrap().unwrap();
        assert_eq!(def.used_count, 0);

        // Instance: consumed by the burn, usable again after the release
        let mut private = percent_voucher("REWARD");
        private.is_public = false;
        private.points_cost = 10;
        vouchers.create_definition(private).await.unwrap();
        db.rewards().ensure_user("u-1").await.unwrap();
        db.rewards().credit("u-1", 10).await.unwrap();
        let instance = vouchers.redeem("u-1", "REWARD").await.unwrap();

        let validated = vouchers
            .validate("u-1", &instance.voucher_code, &cart(), cart_subtotal(&cart()))
            .await
            .unwrap();
        checkout.apply_voucher(&validated).await.unwrap();
        assert!(db.redeemed().get_by_id(&instance.id).await.unwrap().unwrap().is_used);

        checkout.release_voucher(&validated).await;
        assert!(!db.redeemed().get_by_id(&instance.id).await.unwrap().unwrap().is_used);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let (_db, checkout, _tiers, _vouchers) = setup().await;
        let err = checkout.place("u-1", &[], None).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }
}
