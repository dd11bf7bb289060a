//! # emporia-db: Database Layer for the Emporia Checkout Engine
//!
//! SQLite persistence for pricing, loyalty, and voucher state, built on
//! sqlx with async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Emporia Data Flow                                  │
//! │                                                                         │
//! │  Service call (checkout.place, vouchers.redeem, ...)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    emporia-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ TierRepo       │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ VoucherRepo    │   │ 001_initial  │  │   │
//! │  │   │ WAL + FK on   │    │ RedeemedRepo   │   │  _schema.sql │  │   │
//! │  │   │               │    │ RewardRepo     │   │              │  │   │
//! │  │   │               │    │ OrderRepo      │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Contract
//!
//! Shared mutable state (point balances, voucher usage counters, the
//! `is_used` flag, order status) is only ever mutated through atomic
//! conditional updates. Callers learn they lost a race via
//! [`DbError::PreconditionFailed`], never via stale reads.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use emporia_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/emporia.db")).await?;
//! db.run_migrations().await?;
//!
//! let tiers = db.tiers().list().await?;
//! db.vouchers().increment_used("SUMMER10").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::order::OrderRepository;
pub use repository::redeemed::RedeemedVoucherRepository;
pub use repository::reward::RewardRepository;
pub use repository::tier::TierRepository;
pub use repository::voucher::VoucherRepository;
