//! # Error Types
//!
//! Domain-specific error types for emporia-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  emporia-core errors (this file)                                       │
//! │  ├── CoreError        - Checkout/loyalty/voucher rule violations       │
//! │  └── ValidationError  - Admin input validation failures                │
//! │                                                                         │
//! │  emporia-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  emporia-engine errors (service layer)                                 │
//! │  └── EngineError      - What API callers see (code + message)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → EngineError → Caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, amounts, status)
//! 3. Errors are enum variants, never String
//! 4. Every rejection carries its specific reason - a voucher is never
//!    silently dropped to "no discount"

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule errors.
///
/// These are the recoverable validation failures the checkout surface
/// reports back to the caller verbatim.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Voucher code or redeemed instance cannot be found.
    ///
    /// ## When This Occurs
    /// - Unknown public code
    /// - Code is not public (private codes are never applied directly)
    /// - Suffixed code that belongs to another user or doesn't exist
    #[error("Voucher not found: {0}")]
    VoucherNotFound(String),

    /// The voucher's validity window excludes the current time.
    #[error("Voucher {code} is expired or not yet active")]
    Expired { code: String },

    /// Global usage limit reached on a public voucher definition.
    #[error("Voucher {code} has reached its usage limit")]
    UsageExhausted { code: String },

    /// Cart subtotal is below the voucher's minimum order value.
    #[error("Minimum order of {min_order} not met (subtotal {subtotal})")]
    MinOrderNotMet { min_order: i64, subtotal: i64 },

    /// Category-targeted voucher applied to a cart with other categories.
    ///
    /// All-or-nothing: a single off-category line rejects the whole cart,
    /// it is never partially discounted.
    #[error("Voucher {code} only applies to carts containing {category} items exclusively")]
    CategoryMismatch { code: String, category: String },

    /// User-targeted voucher applied by someone else.
    #[error("Voucher {code} is reserved for another customer")]
    NotYours { code: String },

    /// Point balance too low to redeem the voucher.
    #[error("Insufficient points: need {needed}, have {available}")]
    InsufficientPoints { needed: i64, available: i64 },

    /// Attempt to consume an already-used voucher instance.
    ///
    /// ## When This Occurs
    /// - Double-spend of a redeemed instance from concurrent sessions
    /// - Restore of an instance that was never consumed
    #[error("Voucher instance {0} is already used")]
    AlreadyUsed(String),

    /// Illegal order status change (including double-cancel).
    #[error("Cannot transition order from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Loyalty tier not found.
    #[error("Tier not found: {0}")]
    TierNotFound(String),

    /// A voucher definition row carries an invalid field combination
    /// (e.g. a fixed voucher with a max_discount cap).
    #[error("Voucher {code} has an invalid rule: {reason}")]
    InvalidVoucherRule { code: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when admin input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid code characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate tier threshold).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientPoints {
            needed: 50,
            available: 12,
        };
        assert_eq!(err.to_string(), "Insufficient points: need 50, have 12");

        let err = CoreError::MinOrderNotMet {
            min_order: 200_000,
            subtotal: 150_000,
        };
        assert_eq!(
            err.to_string(),
            "Minimum order of 200000 not met (subtotal 150000)"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "code".to_string(),
        };
        assert_eq!(err.to_string(), "code is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "points_cost".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
