//! # emporia-core: Pure Business Logic for the Emporia Checkout Engine
//!
//! This crate is the **heart** of the checkout pricing, loyalty-tier and
//! voucher engine. It contains all business logic as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Emporia Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Storefront / Admin (external collaborators)        │   │
//! │  │    cart supply ──► checkout surface ──► order tracking          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  emporia-engine (services)                      │   │
//! │  │    validate voucher, preview, place, cancel, redeem, admin      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ emporia-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │  voucher  │  │   │
//! │  │   │  Tier     │  │   Money   │  │  Quote    │  │  rules    │  │   │
//! │  │   │  Order    │  │  percent  │  │  compose  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   emporia-db (Database Layer)                   │   │
//! │  │        SQLite queries, migrations, atomic conditional updates   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (LoyaltyTier, VoucherDefinition, Order, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`tier`] - Tier resolver (lifetime points → tier standing)
//! - [`pricing`] - Discount composer (cart + tier + voucher → quote)
//! - [`voucher`] - Typed voucher rules and pure eligibility checks
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Admin input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are i64 currency units, floored division
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use emporia_core::money::Money;
//! use emporia_core::pricing::{compose, PricingConfig};
//!
//! let quote = compose(Money::from_units(300_000), None, None, &PricingConfig::default());
//! assert_eq!(quote.earned_points, 30);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod tier;
pub mod types;
pub mod validation;
pub mod voucher;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use emporia_core::Money` instead of
// `use emporia_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{compose, PricingConfig, Quote};
pub use tier::resolve_tier;
pub use types::*;
pub use voucher::{VoucherRule, VoucherTerms};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Flat shipping rate charged below the free-shipping threshold.
///
/// ## Business Reason
/// A single store-wide rate keeps the preview deterministic; carriers are
/// settled outside this engine.
pub const FLAT_SHIPPING_FEE: i64 = 20_000;

/// Store-wide subtotal threshold at/above which shipping is free.
///
/// Tiers may replace (not add to) this threshold via
/// `free_shipping_threshold`.
pub const BASE_FREE_SHIPPING_THRESHOLD: i64 = 500_000;

/// Currency units per reward point: `earned = floor(subtotal / this)`.
///
/// Computed on the pre-discount subtotal, shipping excluded.
pub const POINTS_PER_UNIT: i64 = 10_000;

/// Length of the random redemption suffix appended to instance codes.
pub const REDEMPTION_SUFFIX_LEN: usize = 8;
