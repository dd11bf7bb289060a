//! # Voucher Rules
//!
//! The typed voucher rule union and the pure eligibility checks shared by
//! public definitions and redeemed instances.
//!
//! ## Why a Tagged Union?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The legacy schema stored one record with many nullable fields and     │
//! │  inferred the voucher type from which fields were present. Invalid     │
//! │  combinations (a fixed voucher with a percent cap) could exist.        │
//! │                                                                         │
//! │  VoucherRule moves those combinations to a compile-time impossibility: │
//! │                                                                         │
//! │    Fixed    { amount }                                                  │
//! │    Percent  { percent, max_discount }                                   │
//! │    FreeShip { amount }                                                  │
//! │                                                                         │
//! │  The flat DB row is converted through rule(), which rejects rows       │
//! │  carrying fields their kind cannot have.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Check Order
//! The validator applies checks in a fixed order so the caller always sees
//! the same reason for the same cart: window → usage cap (definitions
//! only, I/O side) → minimum order → category → target user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartLine, RedeemedVoucher, VoucherDefinition, VoucherKind};

/// Separator between an original code and its redemption suffix.
///
/// Definition codes are validated to never contain it, so its presence
/// unambiguously marks a redeemed-instance code.
pub const INSTANCE_CODE_SEPARATOR: char = '_';

// =============================================================================
// Voucher Rule
// =============================================================================

/// The discount rule of a voucher, with type-specific required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum VoucherRule {
    /// Flat amount off the payable total, never below zero.
    Fixed { amount: i64 },
    /// `floor(subtotal × percent / 100)`, capped at `max_discount` if set.
    Percent {
        percent: u32,
        max_discount: Option<i64>,
    },
    /// Discounts the shipping fee only: `min(amount, shipping_fee)`.
    FreeShip { amount: i64 },
}

impl VoucherRule {
    /// The flat kind tag, for persistence and display.
    pub const fn kind(&self) -> VoucherKind {
        match self {
            VoucherRule::Fixed { .. } => VoucherKind::Fixed,
            VoucherRule::Percent { .. } => VoucherKind::Percent,
            VoucherRule::FreeShip { .. } => VoucherKind::Freeship,
        }
    }
}

/// Builds a typed rule from flat (kind, value, max_discount) columns,
/// rejecting combinations the kind cannot carry.
fn rule_from_columns(
    code: &str,
    kind: VoucherKind,
    value: i64,
    max_discount: Option<i64>,
) -> CoreResult<VoucherRule> {
    match kind {
        VoucherKind::Fixed => {
            if max_discount.is_some() {
                return Err(CoreError::InvalidVoucherRule {
                    code: code.to_string(),
                    reason: "fixed vouchers cannot carry max_discount".to_string(),
                });
            }
            Ok(VoucherRule::Fixed { amount: value })
        }
        VoucherKind::Percent => {
            if !(0..=100).contains(&value) {
                return Err(CoreError::InvalidVoucherRule {
                    code: code.to_string(),
                    reason: format!("percent value {value} outside 0-100"),
                });
            }
            Ok(VoucherRule::Percent {
                percent: value as u32,
                max_discount,
            })
        }
        VoucherKind::Freeship => {
            if max_discount.is_some() {
                return Err(CoreError::InvalidVoucherRule {
                    code: code.to_string(),
                    reason: "freeship vouchers cannot carry max_discount".to_string(),
                });
            }
            Ok(VoucherRule::FreeShip { amount: value })
        }
    }
}

// =============================================================================
// Voucher Terms
// =============================================================================

/// The eligibility-relevant fields of a voucher, independent of whether
/// they came from a live definition or a frozen instance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VoucherTerms {
    /// The code the customer applied (instance code for redeemed vouchers).
    pub code: String,

    /// The typed discount rule.
    pub rule: VoucherRule,

    /// Minimum subtotal required to apply.
    pub min_order: Option<i64>,

    /// Restricts to carts whose items are ALL of this category.
    pub target_category: Option<String>,

    /// Restricts the voucher to a single user (definitions only;
    /// instances are owner-bound by construction).
    pub target_user_id: Option<String>,

    /// Validity window start. None = no lower bound.
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,

    /// Validity window end. None = no upper bound.
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl VoucherTerms {
    /// Rejects with `Expired` if the validity window excludes `now`.
    pub fn check_window(&self, now: DateTime<Utc>) -> CoreResult<()> {
        let before_start = self.valid_from.map_or(false, |from| now < from);
        let after_end = self.valid_until.map_or(false, |until| now > until);
        if before_start || after_end {
            return Err(CoreError::Expired {
                code: self.code.clone(),
            });
        }
        Ok(())
    }

    /// Rejects with `MinOrderNotMet` if the subtotal is below the floor.
    pub fn check_min_order(&self, subtotal: Money) -> CoreResult<()> {
        if let Some(min_order) = self.min_order {
            if subtotal.units() < min_order {
                return Err(CoreError::MinOrderNotMet {
                    min_order,
                    subtotal: subtotal.units(),
                });
            }
        }
        Ok(())
    }

    /// Rejects with `CategoryMismatch` unless EVERY cart line matches the
    /// target category. Partial-category carts are rejected outright, not
    /// partially discounted.
    pub fn check_category(&self, cart: &[CartLine]) -> CoreResult<()> {
        if let Some(category) = &self.target_category {
            if cart.iter().any(|line| &line.category != category) {
                return Err(CoreError::CategoryMismatch {
                    code: self.code.clone(),
                    category: category.clone(),
                });
            }
        }
        Ok(())
    }

    /// Rejects with `NotYours` if the voucher targets a different user.
    pub fn check_target_user(&self, user_id: &str) -> CoreResult<()> {
        if let Some(target) = &self.target_user_id {
            if target != user_id {
                return Err(CoreError::NotYours {
                    code: self.code.clone(),
                });
            }
        }
        Ok(())
    }

    /// Runs every pure check in the contract order: window → minimum
    /// order → category → target user.
    ///
    /// The usage-cap check sits between window and minimum order but
    /// needs the live `used_count`, so the validator service interleaves
    /// it on the definition path.
    pub fn check_cart(
        &self,
        user_id: &str,
        cart: &[CartLine],
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.check_window(now)?;
        self.check_min_order(subtotal)?;
        self.check_category(cart)?;
        self.check_target_user(user_id)?;
        Ok(())
    }
}

// =============================================================================
// Conversions From Stored Shapes
// =============================================================================

impl VoucherDefinition {
    /// The typed discount rule of this definition.
    pub fn rule(&self) -> CoreResult<VoucherRule> {
        rule_from_columns(&self.code, self.kind, self.value, self.max_discount)
    }

    /// The eligibility terms of this definition.
    pub fn terms(&self) -> CoreResult<VoucherTerms> {
        Ok(VoucherTerms {
            code: self.code.clone(),
            rule: self.rule()?,
            min_order: self.min_order,
            target_category: self.target_category.clone(),
            target_user_id: self.target_user_id.clone(),
            valid_from: self.valid_from,
            valid_until: self.valid_until,
        })
    }

    /// Whether a global usage limit exists and has been reached.
    pub fn usage_exhausted(&self) -> bool {
        self.usage_limit
            .map_or(false, |limit| self.used_count >= limit)
    }
}

impl RedeemedVoucher {
    /// The typed discount rule frozen into this instance.
    pub fn rule(&self) -> CoreResult<VoucherRule> {
        rule_from_columns(&self.voucher_code, self.kind, self.value, self.max_discount)
    }

    /// The eligibility terms frozen into this instance.
    ///
    /// Instances carry no `valid_from` (they are live from redemption)
    /// and no target user: ownership was fixed at minting.
    pub fn terms(&self) -> CoreResult<VoucherTerms> {
        Ok(VoucherTerms {
            code: self.voucher_code.clone(),
            rule: self.rule()?,
            min_order: self.min_order,
            target_category: self.target_category.clone(),
            target_user_id: None,
            valid_from: None,
            valid_until: self.valid_until,
        })
    }
}

// =============================================================================
// Instance Code Helpers
// =============================================================================

/// Whether a code names a redeemed instance rather than a definition.
pub fn is_instance_code(code: &str) -> bool {
    code.contains(INSTANCE_CODE_SEPARATOR)
}

/// Joins an original code and a redemption suffix into an instance code.
pub fn instance_code(original_code: &str, suffix: &str) -> String {
    format!("{original_code}{INSTANCE_CODE_SEPARATOR}{suffix}")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn terms(rule: VoucherRule) -> VoucherTerms {
        VoucherTerms {
            code: "TEST10".to_string(),
            rule,
            min_order: None,
            target_category: None,
            target_user_id: None,
            valid_from: None,
            valid_until: None,
        }
    }

    fn line(category: &str) -> CartLine {
        CartLine {
            product_id: "p1".to_string(),
            quantity: 1,
            unit_price: 10_000,
            category: category.to_string(),
        }
    }

    #[test]
    fn test_rule_from_columns() {
        let rule = rule_from_columns("A", VoucherKind::Fixed, 30_000, None).unwrap();
        assert_eq!(rule, VoucherRule::Fixed { amount: 30_000 });
        assert_eq!(rule.kind(), VoucherKind::Fixed);

        let rule = rule_from_columns("B", VoucherKind::Percent, 50, Some(10_000)).unwrap();
        assert_eq!(
            rule,
            VoucherRule::Percent {
                percent: 50,
                max_discount: Some(10_000)
            }
        );
    }

    #[test]
    fn test_invalid_rule_combinations() {
        // A fixed voucher with a percent cap is a data bug, not a discount
        let err = rule_from_columns("A", VoucherKind::Fixed, 30_000, Some(5_000)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidVoucherRule { .. }));

        let err = rule_from_columns("B", VoucherKind::Percent, 150, None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidVoucherRule { .. }));

        let err = rule_from_columns("C", VoucherKind::Freeship, 20_000, Some(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidVoucherRule { .. }));
    }

    #[test]
    fn test_window_bounds() {
        let now = Utc::now();
        let mut t = terms(VoucherRule::Fixed { amount: 1000 });

        // No bounds: always valid
        assert!(t.check_window(now).is_ok());

        t.valid_from = Some(now + Duration::hours(1));
        assert!(matches!(
            t.check_window(now),
            Err(CoreError::Expired { .. })
        ));

        t.valid_from = Some(now - Duration::hours(2));
        t.valid_until = Some(now - Duration::hours(1));
        assert!(matches!(
            t.check_window(now),
            Err(CoreError::Expired { .. })
        ));

        t.valid_until = Some(now + Duration::hours(1));
        assert!(t.check_window(now).is_ok());
    }

    #[test]
    fn test_min_order() {
        let mut t = terms(VoucherRule::Fixed { amount: 1000 });
        t.min_order = Some(200_000);

        assert!(matches!(
            t.check_min_order(Money::from_units(150_000)),
            Err(CoreError::MinOrderNotMet {
                min_order: 200_000,
                subtotal: 150_000
            })
        ));
        assert!(t.check_min_order(Money::from_units(200_000)).is_ok());
    }

    #[test]
    fn test_category_all_or_nothing() {
        let mut t = terms(VoucherRule::Fixed { amount: 1000 });
        t.target_category = Some("coffee".to_string());

        // All lines match
        assert!(t.check_category(&[line("coffee"), line("coffee")]).is_ok());

        // One off-category line rejects the whole cart
        assert!(matches!(
            t.check_category(&[line("coffee"), line("tea")]),
            Err(CoreError::CategoryMismatch { .. })
        ));

        // Untargeted voucher ignores categories
        t.target_category = None;
        assert!(t.check_category(&[line("coffee"), line("tea")]).is_ok());
    }

    #[test]
    fn test_target_user() {
        let mut t = terms(VoucherRule::Fixed { amount: 1000 });
        t.target_user_id = Some("user-1".to_string());

        assert!(t.check_target_user("user-1").is_ok());
        assert!(matches!(
            t.check_target_user("user-2"),
            Err(CoreError::NotYours { .. })
        ));
    }

    #[test]
    fn test_instance_code_helpers() {
        let code = instance_code("FREESHIP", "A8F2K1");
        assert_eq!(code, "FREESHIP_A8F2K1");
        assert!(is_instance_code(&code));
        assert!(!is_instance_code("FREESHIP"));
    }
}
