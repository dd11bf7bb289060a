//! # Discount Composer
//!
//! Combines tier discount and voucher discount into a final payable total
//! and shipping fee. Pure given its inputs; performs no I/O.
//!
//! ## Composition Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Quote Composition                                 │
//! │                                                                         │
//! │  subtotal (pre-discount, from cart)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. shipping fee    flat rate below threshold, zero at/above.          │
//! │                     A tier free_shipping_threshold REPLACES the        │
//! │                     store-wide threshold entirely (not additive).      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. tier discount   floor(subtotal × tier% / 100), unconditional,      │
//! │                     stacks with any voucher                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. voucher         fixed    → clamped to the payable amount           │
//! │     discount        percent  → floor(subtotal × v / 100), capped       │
//! │                     freeship → min(value, shipping fee)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. total = max(0, subtotal + shipping − tier − voucher)               │
//! │  5. earned points = floor(subtotal / points_per_unit)                  │
//! │                     (pre-discount subtotal, shipping excluded)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::LoyaltyTier;
use crate::voucher::VoucherRule;
use crate::{BASE_FREE_SHIPPING_THRESHOLD, FLAT_SHIPPING_FEE, POINTS_PER_UNIT};

// =============================================================================
// Pricing Config
// =============================================================================

/// Store-wide pricing constants.
///
/// Defaults mirror the observed store configuration; the engine's
/// `StoreConfig` can override them per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricingConfig {
    /// Flat shipping rate charged below the free-shipping threshold.
    pub flat_shipping_fee: i64,

    /// Store-wide subtotal threshold at/above which shipping is free.
    pub base_free_shipping_threshold: i64,

    /// Currency units per reward point earned.
    pub points_per_unit: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            flat_shipping_fee: FLAT_SHIPPING_FEE,
            base_free_shipping_threshold: BASE_FREE_SHIPPING_THRESHOLD,
            points_per_unit: POINTS_PER_UNIT,
        }
    }
}

// =============================================================================
// Quote
// =============================================================================

/// The pricing breakdown for a cart: what the lifecycle controller
/// persists onto the order at placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Quote {
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub tier_discount: i64,
    pub voucher_discount: i64,
    /// Payable amount; never negative.
    pub total: i64,
    /// Reward points this order grants. Persisted on the order and
    /// refunded verbatim on cancellation, never recomputed.
    pub earned_points: i64,
}

// =============================================================================
// Composition
// =============================================================================

/// Composes the final quote for a cart.
///
/// ## Arguments
/// * `subtotal` - Pre-discount merchandise subtotal
/// * `tier` - The user's resolved loyalty tier, if any
/// * `voucher` - The validated voucher rule, if one is applied
/// * `config` - Store-wide pricing constants
pub fn compose(
    subtotal: Money,
    tier: Option<&LoyaltyTier>,
    voucher: Option<&VoucherRule>,
    config: &PricingConfig,
) -> Quote {
    let shipping_fee = shipping_fee(subtotal, tier, config);

    let tier_discount = match tier {
        Some(t) if t.discount_percent > 0 => subtotal.percent(t.discount_percent),
        _ => Money::zero(),
    };

    let voucher_discount = match voucher {
        Some(rule) => voucher_discount(subtotal, shipping_fee, tier_discount, rule),
        None => Money::zero(),
    };

    let total = (subtotal + shipping_fee)
        .saturating_sub(tier_discount)
        .saturating_sub(voucher_discount);

    // Earned on the pre-discount subtotal, shipping excluded
    let earned_points = if config.points_per_unit > 0 {
        subtotal.units().max(0) / config.points_per_unit
    } else {
        0
    };

    Quote {
        subtotal: subtotal.units(),
        shipping_fee: shipping_fee.units(),
        tier_discount: tier_discount.units(),
        voucher_discount: voucher_discount.units(),
        total: total.units(),
        earned_points,
    }
}

/// Computes the shipping fee for a subtotal.
///
/// A tier `free_shipping_threshold` override replaces the base threshold
/// entirely: `Some(0)` means always free, `Some(n)` means free at or
/// above `n`, `None` falls back to the store-wide threshold.
fn shipping_fee(subtotal: Money, tier: Option<&LoyaltyTier>, config: &PricingConfig) -> Money {
    let threshold = tier
        .and_then(|t| t.free_shipping_threshold)
        .unwrap_or(config.base_free_shipping_threshold);

    if subtotal.units() >= threshold {
        Money::zero()
    } else {
        Money::from_units(config.flat_shipping_fee)
    }
}

/// Computes the voucher discount for a validated rule.
fn voucher_discount(
    subtotal: Money,
    shipping_fee: Money,
    tier_discount: Money,
    rule: &VoucherRule,
) -> Money {
    match rule {
        // Never exceeds the order's payable amount
        VoucherRule::Fixed { amount } => {
            let payable = (subtotal + shipping_fee).saturating_sub(tier_discount);
            Money::from_units(*amount).min(payable)
        }
        VoucherRule::Percent {
            percent,
            max_discount,
        } => {
            let discount = subtotal.percent(*percent);
            match max_discount {
                Some(cap) => discount.min(Money::from_units(*cap)),
                None => discount,
            }
        }
        // Cannot discount beyond the shipping fee itself
        VoucherRule::FreeShip { amount } => Money::from_units(*amount).min(shipping_fee),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tier(discount_percent: u32, free_shipping_threshold: Option<i64>) -> LoyaltyTier {
        LoyaltyTier {
            id: "tier-1".to_string(),
            slug: "gold".to_string(),
            name: "Gold".to_string(),
            min_points: 500,
            discount_percent,
            free_shipping_threshold,
            icon: None,
            benefits: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn config() -> PricingConfig {
        PricingConfig::default()
    }

    #[test]
    fn test_tier_discount_scenario() {
        // subtotal 300,000; tier 5% with always-free shipping override
        let quote = compose(
            Money::from_units(300_000),
            Some(&tier(5, Some(0))),
            None,
            &config(),
        );
        assert_eq!(quote.shipping_fee, 0);
        assert_eq!(quote.tier_discount, 15_000);
        assert_eq!(quote.total, 285_000);
        assert_eq!(quote.earned_points, 30);
    }

    #[test]
    fn test_freeship_voucher_scenario() {
        // subtotal 100,000 (below threshold); freeship value 20,000;
        // flat fee 20,000 → fee fully covered, merchandise untouched
        let quote = compose(
            Money::from_units(100_000),
            None,
            Some(&VoucherRule::FreeShip { amount: 20_000 }),
            &config(),
        );
        assert_eq!(quote.shipping_fee, 20_000);
        assert_eq!(quote.voucher_discount, 20_000);
        assert_eq!(quote.total, 100_000);
    }

    #[test]
    fn test_percent_voucher_cap_scenario() {
        // 50% of 500,000 would be 250,000; cap holds it at 10,000
        let quote = compose(
            Money::from_units(500_000),
            None,
            Some(&VoucherRule::Percent {
                percent: 50,
                max_discount: Some(10_000),
            }),
            &config(),
        );
        assert_eq!(quote.voucher_discount, 10_000);
    }

    #[test]
    fn test_percent_voucher_uncapped() {
        let quote = compose(
            Money::from_units(200_000),
            None,
            Some(&VoucherRule::Percent {
                percent: 10,
                max_discount: None,
            }),
            &config(),
        );
        assert_eq!(quote.voucher_discount, 20_000);
    }

    #[test]
    fn test_freeship_never_exceeds_fee() {
        // Voucher worth more than the fee only covers the fee
        let quote = compose(
            Money::from_units(100_000),
            None,
            Some(&VoucherRule::FreeShip { amount: 50_000 }),
            &config(),
        );
        assert_eq!(quote.voucher_discount, quote.shipping_fee);

        // Free shipping already (at threshold): nothing to discount
        let quote = compose(
            Money::from_units(config().base_free_shipping_threshold),
            None,
            Some(&VoucherRule::FreeShip { amount: 50_000 }),
            &config(),
        );
        assert_eq!(quote.shipping_fee, 0);
        assert_eq!(quote.voucher_discount, 0);
    }

    #[test]
    fn test_fixed_voucher_clamped_to_payable() {
        // 1,000,000 off a 50,000 order discounts exactly the payable amount
        let quote = compose(
            Money::from_units(50_000),
            None,
            Some(&VoucherRule::Fixed { amount: 1_000_000 }),
            &config(),
        );
        assert_eq!(quote.voucher_discount, 50_000 + quote.shipping_fee);
        assert_eq!(quote.total, 0);
    }

    #[test]
    fn test_total_never_negative() {
        let vouchers = [
            VoucherRule::Fixed { amount: i64::MAX / 4 },
            VoucherRule::Percent {
                percent: 100,
                max_discount: None,
            },
            VoucherRule::FreeShip { amount: i64::MAX / 4 },
        ];
        for subtotal in [0i64, 1, 19_999, 100_000, 500_000, 10_000_000] {
            for rule in &vouchers {
                let quote = compose(
                    Money::from_units(subtotal),
                    Some(&tier(10, None)),
                    Some(rule),
                    &config(),
                );
                assert!(quote.total >= 0, "subtotal={subtotal} rule={rule:?}");
                assert!(quote.tier_discount >= 0);
                assert!(quote.voucher_discount >= 0);
            }
        }
    }

    #[test]
    fn test_tier_and_voucher_stack() {
        // Tier 5% and a fixed 10,000 voucher both apply, independently
        let quote = compose(
            Money::from_units(600_000), // above base threshold: free shipping
            Some(&tier(5, None)),
            Some(&VoucherRule::Fixed { amount: 10_000 }),
            &config(),
        );
        assert_eq!(quote.shipping_fee, 0);
        assert_eq!(quote.tier_discount, 30_000);
        assert_eq!(quote.voucher_discount, 10_000);
        assert_eq!(quote.total, 560_000);
    }

    #[test]
    fn test_tier_threshold_override_replaces_base() {
        // Tier override RAISES the threshold: subtotal above base but
        // below the override still pays shipping
        let above_base = config().base_free_shipping_threshold + 100_000;
        let quote = compose(
            Money::from_units(above_base),
            Some(&tier(0, Some(above_base + 1))),
            None,
            &config(),
        );
        assert_eq!(quote.shipping_fee, config().flat_shipping_fee);
    }

    #[test]
    fn test_earned_points_floor_and_exclusions() {
        // floor(99,999 / 10,000) = 9; shipping fee never earns points
        let quote = compose(Money::from_units(99_999), None, None, &config());
        assert_eq!(quote.earned_points, 9);

        // Points computed pre-discount: a large voucher doesn't shrink them
        let quote = compose(
            Money::from_units(300_000),
            None,
            Some(&VoucherRule::Fixed { amount: 200_000 }),
            &config(),
        );
        assert_eq!(quote.earned_points, 30);
    }
}
