//! # Engine Error Type
//!
//! Unified error type for the engine's service surface.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Emporia                                │
//! │                                                                         │
//! │  Platform caller             Engine services                            │
//! │  ───────────────             ───────────────                            │
//! │                                                                         │
//! │  checkout.place(...)                                                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Service method                                                  │  │
//! │  │  Result<T, EngineError>                                          │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Rule violation? ── CoreError::MinOrderNotMet ──────┐           │  │
//! │  │         │                                           │           │  │
//! │  │         ▼                                           ▼           │  │
//! │  │  Storage failure? ── DbError::Busy ─────────── EngineError ────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "MIN_ORDER_NOT_MET",                                         │
//! │    "message": "Minimum order of 200000 not met (subtotal 150000)" }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! The struct serializes with a machine-readable `code` and a
//! human-readable `message`, so callers can branch without parsing text.

use serde::Serialize;
use thiserror::Error;

use emporia_core::CoreError;
use emporia_db::DbError;

/// Error returned from every engine service method.
#[derive(Debug, Clone, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct EngineError {
    /// Machine-readable error code for programmatic handling.
    pub code: ErrorCode,

    /// Human-readable error message for display.
    pub message: String,
}

/// Error codes for engine responses.
///
/// The voucher/checkout codes mirror the rejection taxonomy one-to-one:
/// a voucher is never silently dropped to "no discount", the caller
/// always learns the specific reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (unknown code, order, tier, instance).
    NotFound,

    /// Voucher validity window excludes the current time.
    Expired,

    /// Global usage limit reached on a voucher definition.
    UsageExhausted,

    /// Cart subtotal below the voucher's minimum order value.
    MinOrderNotMet,

    /// Category-targeted voucher on a mixed-category cart.
    CategoryMismatch,

    /// User-targeted voucher applied by someone else.
    NotYours,

    /// Point balance too low to redeem.
    InsufficientPoints,

    /// Double-consume (or restore of an unconsumed instance).
    AlreadyUsed,

    /// Illegal order status change, including double-cancel races.
    InvalidTransition,

    /// Admin input validation failed.
    ValidationError,

    /// Transient storage conflict that outlived the retry budget.
    Transient,

    /// Database operation failed.
    DatabaseError,

    /// Internal error (data bugs, broken invariants).
    Internal,
}

impl EngineError {
    /// Creates a new engine error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
        }
    }

    /// A NotFound error with a standard message.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        EngineError::new(ErrorCode::NotFound, format!("{what} not found"))
    }

    /// A ValidationError with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::ValidationError, message)
    }

    /// The typed transient failure surfaced when retries are exhausted.
    pub fn transient(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Transient, message)
    }
}

/// Business rule violations map one-to-one onto caller-visible codes.
impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::VoucherNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::TierNotFound(_) => ErrorCode::NotFound,
            CoreError::Expired { .. } => ErrorCode::Expired,
            CoreError::UsageExhausted { .. } => ErrorCode::UsageExhausted,
            CoreError::MinOrderNotMet { .. } => ErrorCode::MinOrderNotMet,
            CoreError::CategoryMismatch { .. } => ErrorCode::CategoryMismatch,
            CoreError::NotYours { .. } => ErrorCode::NotYours,
            CoreError::InsufficientPoints { .. } => ErrorCode::InsufficientPoints,
            CoreError::AlreadyUsed(_) => ErrorCode::AlreadyUsed,
            CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            CoreError::Validation(_) => ErrorCode::ValidationError,
            // A stored rule a kind cannot carry is a data bug, not a
            // recoverable rejection
            CoreError::InvalidVoucherRule { .. } => ErrorCode::Internal,
        };
        EngineError::new(code, err.to_string())
    }
}

/// Storage failures map onto coarse codes.
///
/// `PreconditionFailed` is deliberately NOT given a business meaning
/// here: each service maps it onto the specific rejection for the call
/// (InsufficientPoints, AlreadyUsed, UsageExhausted, InvalidTransition)
/// before it can reach this blanket conversion.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        let code = match &err {
            DbError::NotFound { .. } => ErrorCode::NotFound,
            DbError::UniqueViolation { .. } => ErrorCode::ValidationError,
            DbError::Busy(_) | DbError::PoolExhausted => ErrorCode::Transient,
            _ => ErrorCode::DatabaseError,
        };
        EngineError::new(code, err.to_string())
    }
}

impl From<emporia_core::ValidationError> for EngineError {
    fn from(err: emporia_core::ValidationError) -> Self {
        EngineError::new(ErrorCode::ValidationError, err.to_string())
    }
}

/// Result type for engine service methods.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let err: EngineError = CoreError::MinOrderNotMet {
            min_order: 200_000,
            subtotal: 150_000,
        }
        .into();
        assert_eq!(err.code, ErrorCode::MinOrderNotMet);
        assert!(err.message.contains("200000"));

        let err: EngineError = CoreError::VoucherNotFound("NOPE".to_string()).into();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_db_error_mapping() {
        let err: EngineError = DbError::Busy("database is locked".to_string()).into();
        assert_eq!(err.code, ErrorCode::Transient);

        let err: EngineError = DbError::not_found("Order", "o-1").into();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_serialization_shape() {
        let err = EngineError::new(ErrorCode::InsufficientPoints, "need 50, have 12");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_POINTS");
        assert_eq!(json["message"], "need 50, have 12");
    }
}
