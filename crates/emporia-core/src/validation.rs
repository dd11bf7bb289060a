//! # Validation Module
//!
//! Input validation for the admin surface (tier and voucher CRUD).
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin frontend                                               │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine services (Rust)                                       │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE constraints (codes, slugs, thresholds)                     │
//! │  └── CHECK constraints (discount_percent range)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::LoyaltyTier;
use crate::voucher::INSTANCE_CODE_SEPARATOR;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Voucher Validators
// =============================================================================

/// Validates a voucher definition code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits and hyphens only. The underscore is reserved as the
///   redemption-suffix separator, so a definition code can never be
///   mistaken for an instance code.
///
/// ## Example
/// ```rust
/// use emporia_core::validation::validate_voucher_code;
///
/// assert!(validate_voucher_code("SUMMER10").is_ok());
/// assert!(validate_voucher_code("FREESHIP_A1").is_err());
/// assert!(validate_voucher_code("").is_err());
/// ```
pub fn validate_voucher_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 50,
        });
    }

    if code.contains(INSTANCE_CODE_SEPARATOR) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "underscore is reserved for redemption suffixes".to_string(),
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates the point cost of a points-redeemable voucher.
pub fn validate_points_cost(points_cost: i64, is_public: bool) -> ValidationResult<()> {
    if !is_public && points_cost <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "points_cost".to_string(),
        });
    }
    if points_cost < 0 {
        return Err(ValidationError::MustBePositive {
            field: "points_cost".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Tier Validators
// =============================================================================

/// Validates a tier slug.
pub fn validate_tier_slug(slug: &str) -> ValidationResult<()> {
    let slug = slug.trim();

    if slug.is_empty() {
        return Err(ValidationError::Required {
            field: "slug".to_string(),
        });
    }

    if slug.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "slug".to_string(),
            max: 50,
        });
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "slug".to_string(),
            reason: "must contain only lowercase letters, numbers and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates a tier discount percentage.
pub fn validate_discount_percent(percent: u32) -> ValidationResult<()> {
    if percent > 100 {
        return Err(ValidationError::OutOfRange {
            field: "discount_percent".to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Validates that a new or updated tier keeps the ladder thresholds
/// unique. `existing` is the current ladder minus the tier being edited.
pub fn validate_tier_threshold(min_points: i64, existing: &[LoyaltyTier]) -> ValidationResult<()> {
    if min_points < 0 {
        return Err(ValidationError::OutOfRange {
            field: "min_points".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if existing.iter().any(|t| t.min_points == min_points) {
        return Err(ValidationError::Duplicate {
            field: "min_points".to_string(),
            value: min_points.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_voucher_code_rules() {
        assert!(validate_voucher_code("SUMMER10").is_ok());
        assert!(validate_voucher_code("FREE-SHIP").is_ok());
        assert!(validate_voucher_code("").is_err());
        assert!(validate_voucher_code(&"A".repeat(60)).is_err());
        // Underscore is reserved for instance codes
        assert!(validate_voucher_code("BAD_CODE").is_err());
        assert!(validate_voucher_code("NO SPACES").is_err());
    }

    #[test]
    fn test_points_cost() {
        // Private vouchers must cost points
        assert!(validate_points_cost(0, false).is_err());
        assert!(validate_points_cost(50, false).is_ok());
        // Public vouchers cost nothing
        assert!(validate_points_cost(0, true).is_ok());
        assert!(validate_points_cost(-1, true).is_err());
    }

    #[test]
    fn test_tier_slug() {
        assert!(validate_tier_slug("gold").is_ok());
        assert!(validate_tier_slug("tier-2").is_ok());
        assert!(validate_tier_slug("Gold").is_err());
        assert!(validate_tier_slug("").is_err());
    }

    #[test]
    fn test_discount_percent() {
        assert!(validate_discount_percent(0).is_ok());
        assert!(validate_discount_percent(100).is_ok());
        assert!(validate_discount_percent(101).is_err());
    }

    #[test]
    fn test_tier_threshold_uniqueness() {
        let existing = vec![LoyaltyTier {
            id: "t1".to_string(),
            slug: "silver".to_string(),
            name: "Silver".to_string(),
            min_points: 100,
            discount_percent: 3,
            free_shipping_threshold: None,
            icon: None,
            benefits: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }];

        assert!(validate_tier_threshold(500, &existing).is_ok());
        assert!(validate_tier_threshold(100, &existing).is_err());
        assert!(validate_tier_threshold(-1, &existing).is_err());
    }
}
