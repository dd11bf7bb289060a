//! # Domain Types
//!
//! Core domain types for the checkout pricing, loyalty-tier and voucher
//! engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │  LoyaltyTier    │   │ VoucherDefinition│   │ RedeemedVoucher  │    │
//! │  │  ─────────────  │   │  ──────────────  │   │  ──────────────  │    │
//! │  │  slug           │   │  code (unique)   │   │  voucher_code    │    │
//! │  │  min_points     │   │  kind/value      │   │  snapshot fields │    │
//! │  │  discount_%     │   │  usage caps      │   │  is_used         │    │
//! │  └─────────────────┘   └──────────────────┘   └──────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │     Order       │   │   OrderStatus    │   │   CartLine       │    │
//! │  │  ─────────────  │   │  ──────────────  │   │  ──────────────  │    │
//! │  │  pricing totals │   │  Pending..       │   │  external input  │    │
//! │  │  earned_points  │   │  Delivered       │   │  price snapshot  │    │
//! │  │  voucher_code   │   │  Cancelled       │   │  category        │    │
//! │  └─────────────────┘   └──────────────────┘   └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Entities have an `id` (UUID v4, immutable, used for relations) and a
//! business key where one exists (tier `slug`, voucher `code`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Loyalty Tier
// =============================================================================

/// A loyalty level unlocked by lifetime reward points.
///
/// ## Threshold Semantics
/// - `min_points`: ascending, unique per tier
/// - `free_shipping_threshold`: `None` = no override of the store-wide
///   threshold, `Some(0)` = shipping always free, `Some(n)` = free at or
///   above `n`. The override REPLACES the base threshold, it is not additive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyTier {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier, e.g. "silver".
    pub slug: String,

    /// Display name shown to the customer.
    pub name: String,

    /// Lifetime points required to reach this tier.
    pub min_points: i64,

    /// Discount applied to every order subtotal, 0-100.
    pub discount_percent: u32,

    /// Optional override of the store-wide free-shipping threshold.
    pub free_shipping_threshold: Option<i64>,

    /// Icon shown next to the tier name.
    pub icon: Option<String>,

    /// Ordered list of benefit strings for display.
    pub benefits: Vec<String>,

    /// When the tier was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the tier was last updated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A user's position in the tier ladder, as produced by the tier resolver.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TierStanding {
    /// The resolved active tier.
    pub tier: LoyaltyTier,

    /// The next tier up, or None when at the top.
    pub next_tier: Option<LoyaltyTier>,

    /// Percent progress toward the next tier, clamped to 0-100.
    /// Not meaningful when `next_tier` is None.
    pub progress_percent: u32,

    /// Points remaining to reach the next tier (0 when at the top).
    pub points_to_next: i64,
}

// =============================================================================
// User Reward State
// =============================================================================

/// The reward-point fields of a user record.
///
/// ## Dual-Purpose Currency
/// - `points`: spendable balance, decremented only by voucher redemption
/// - `total_points`: lifetime accumulation, never spent, drives tier
///   resolution
///
/// Both increase together when an order is placed; cancellation reverses
/// exactly the amount the cancelled order granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserRewardState {
    pub user_id: String,
    pub points: i64,
    pub total_points: i64,
}

// =============================================================================
// Voucher Kind
// =============================================================================

/// The three voucher families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VoucherKind {
    /// Flat amount off the payable total.
    Fixed,
    /// Percentage of the subtotal, optionally capped.
    Percent,
    /// Discounts the shipping fee only.
    Freeship,
}

// =============================================================================
// Voucher Definition
// =============================================================================

/// The catalog template for a discount code (rules, not a specific grant).
///
/// ## Public vs Private
/// - `is_public = true`: homepage-visible, applied directly by code
/// - `is_public = false`: obtained only by spending `points_cost` points,
///   which mints a [`RedeemedVoucher`] instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct VoucherDefinition {
    /// Unique code, e.g. "SUMMER10".
    pub code: String,

    /// Voucher family; see [`VoucherKind`].
    pub kind: VoucherKind,

    /// Meaning depends on `kind`: flat amount, percent (0-100), or the
    /// maximum shipping amount a freeship voucher covers.
    pub value: i64,

    /// Cap for percent vouchers. Invalid on other kinds; the typed
    /// [`crate::voucher::VoucherRule`] makes that unrepresentable.
    pub max_discount: Option<i64>,

    /// Minimum subtotal required to apply.
    pub min_order: Option<i64>,

    /// Global usage cap across all users. None = unlimited.
    pub usage_limit: Option<i64>,

    /// Times this definition has been applied on placed orders.
    pub used_count: i64,

    /// Restricts the voucher to a single user.
    pub target_user_id: Option<String>,

    /// Restricts to carts whose items are ALL of this category.
    pub target_category: Option<String>,

    /// Validity window start (inclusive). None = no lower bound.
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,

    /// Validity window end (inclusive). None = no upper bound.
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,

    /// Whether the code is directly redeemable (vs points-only).
    pub is_public: bool,

    /// Point cost to mint an instance; 0 for public vouchers.
    pub points_cost: i64,

    /// Icon shown in voucher listings.
    pub icon: Option<String>,

    /// Human-readable description.
    pub description: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Redeemed Voucher Instance
// =============================================================================

/// A single-use, user-owned grant created by spending points against a
/// voucher definition.
///
/// ## Snapshot Pattern
/// All rule fields are denormalized copies taken at redemption time, so
/// the instance stays valid even if the source definition is later edited
/// or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RedeemedVoucher {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owner; instances are never shared across users.
    pub user_id: String,

    /// Globally unique per-instance code: `{original_code}_{suffix}`.
    pub voucher_code: String,

    /// The definition code this instance was minted from.
    pub original_code: String,

    /// Voucher family at redemption time (frozen).
    pub kind: VoucherKind,

    /// Rule value at redemption time (frozen).
    pub value: i64,

    /// Percent cap at redemption time (frozen).
    pub max_discount: Option<i64>,

    /// Minimum subtotal at redemption time (frozen).
    pub min_order: Option<i64>,

    /// Category restriction at redemption time (frozen).
    pub target_category: Option<String>,

    /// Expiry at redemption time (frozen).
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,

    /// Description at redemption time (frozen).
    pub description: Option<String>,

    /// Icon at redemption time (frozen).
    pub icon: Option<String>,

    /// Exactly one consumption per instance; never reusable once used.
    pub is_used: bool,

    #[ts(as = "String")]
    pub redeemed_at: DateTime<Utc>,
}

// =============================================================================
// Cart Line
// =============================================================================

/// One line of an incoming cart, supplied by the external cart/catalog
/// collaborator.
///
/// Prices arrive already snapshotted by the caller; the engine freezes
/// them again onto the order at placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    /// Unit price in currency units at the time the cart was built.
    pub unit_price: i64,
    /// Product category, used for category-targeted vouchers.
    pub category: String,
}

impl CartLine {
    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_units(self.unit_price * self.quantity)
    }
}

/// Sums cart lines into a subtotal.
pub fn cart_subtotal(lines: &[CartLine]) -> Money {
    lines
        .iter()
        .fold(Money::zero(), |acc, line| acc + line.line_total())
}

// =============================================================================
// Order Status
// =============================================================================

/// The order lifecycle state machine.
///
/// ```text
/// Pending → Confirmed → Processing → Shipping → Delivered (terminal)
///    │          │            │           │
///    └──────────┴────────────┴───────────┴──► Cancelled (terminal)
///                                                  │
///                                                  └──► Refunded (terminal, manual)
/// ```
///
/// ## Legacy Alias
/// A pre-migration schema used `completed` for the terminal success state.
/// It is accepted at the serde boundary as an alias of [`Delivered`] and
/// never exists as a distinct internal state.
///
/// [`Delivered`]: OrderStatus::Delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, awaiting confirmation.
    Pending,
    /// Confirmed by the store.
    Confirmed,
    /// Being prepared.
    Processing,
    /// Handed to the carrier.
    Shipping,
    /// Terminal success state.
    #[serde(alias = "completed")]
    Delivered,
    /// Terminal; reached from any non-terminal state.
    Cancelled,
    /// Terminal; manual follow-up after Cancelled.
    Refunded,
}

impl OrderStatus {
    /// Whether no transition may leave this state (except Cancelled →
    /// Refunded, which is modeled explicitly below).
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Whether a cancel request is still permitted from this state.
    pub const fn is_cancellable(&self) -> bool {
        !self.is_terminal()
    }

    /// The single legal forward step in the success chain, if any.
    pub const fn next_in_chain(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipping),
            OrderStatus::Shipping => Some(OrderStatus::Delivered),
            _ => None,
        }
    }

    /// Validates a status change, including admin overrides.
    ///
    /// ## Rules
    /// - Forward one step along the success chain
    /// - Any non-terminal state → Cancelled
    /// - Cancelled → Refunded (manual follow-up)
    /// - Nothing else; terminal states are final
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        if to == OrderStatus::Cancelled {
            return self.is_cancellable();
        }
        if to == OrderStatus::Refunded {
            return *self == OrderStatus::Cancelled;
        }
        self.next_in_chain() == Some(to)
    }

    /// The stable string form used in SQL and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Order
// =============================================================================

/// A placed order with its pricing breakdown frozen at creation.
///
/// ## Persisted, Never Recomputed
/// `earned_points` and the resolved `tier_slug` are stored at placement
/// and read back verbatim on cancellation. Recomputing them later would
/// silently break if the points formula or tier thresholds change between
/// placement and cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub tier_discount: i64,
    pub voucher_discount: i64,
    pub total: i64,
    /// References either a VoucherDefinition.code or a
    /// RedeemedVoucher.voucher_code (distinguished by the suffix separator).
    pub voucher_code: Option<String>,
    /// Reward points granted by this order; reversed exactly on cancel.
    pub earned_points: i64,
    /// Slug of the tier that priced this order (frozen snapshot).
    pub tier_slug: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns the payable total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_units(self.total)
    }

    /// Returns the pre-discount subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_units(self.subtotal)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses the snapshot pattern to freeze the price at time of purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price in currency units at time of purchase (frozen).
    pub unit_price: i64,
    /// Category at time of purchase (frozen).
    pub category: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_units(self.unit_price * self.quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
