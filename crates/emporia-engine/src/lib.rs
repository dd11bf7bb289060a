//! # emporia-engine: Service Layer for the Emporia Checkout Engine
//!
//! Orchestrates the pure rules in `emporia-core` over the storage in
//! `emporia-db`: pricing previews, order placement and cancellation,
//! voucher redemption and validation, tier resolution with caching, and
//! the admin CRUD surface.
//!
//! ## Service Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        emporia-engine                                   │
//! │                                                                         │
//! │  Customer surface                    Admin surface                      │
//! │  ────────────────                    ─────────────                      │
//! │  CheckoutService                     TierService (CRUD + cache)         │
//! │  ├── preview(cart, code?)            VoucherService (definition CRUD)   │
//! │  └── place(cart, code?)              OrderService                       │
//! │  OrderService                        ├── list_all / get                 │
//! │  ├── cancel (ownership-checked)      └── override_status                │
//! │  └── list_for_user                                                      │
//! │  VoucherService                      Background                         │
//! │  ├── redeem (points → instance)      ──────────                         │
//! │  └── my_vouchers                     spawn_expiry_sweep (advisory)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use emporia_db::{Database, DbConfig};
//! use emporia_engine::{Engine, StoreConfig};
//!
//! let db = Database::new(DbConfig::new("emporia.db")).await?;
//! let engine = Engine::new(db, StoreConfig::default());
//!
//! let preview = engine.checkout.preview(&user_id, &cart, Some("SUMMER10")).await?;
//! let order = engine.checkout.place(&user_id, &cart, Some("SUMMER10")).await?;
//! let cancelled = engine.orders.cancel(&user_id, &order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod error;
pub mod orders;
pub mod retry;
pub mod sweep;
pub mod tiers;
pub mod vouchers;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutPreview, CheckoutService};
pub use config::StoreConfig;
pub use error::{EngineError, EngineResult, ErrorCode};
pub use orders::OrderService;
pub use sweep::{spawn_expiry_sweep, SweepHandle};
pub use tiers::{TierInput, TierService};
pub use vouchers::{ValidatedVoucher, VoucherInput, VoucherService, VoucherSource};

use emporia_db::Database;

/// The assembled engine: every service over one shared database handle.
#[derive(Debug, Clone)]
pub struct Engine {
    pub tiers: TierService,
    pub vouchers: VoucherService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    config: StoreConfig,
    db: Database,
}

impl Engine {
    /// Wires up all services over the given database.
    pub fn new(db: Database, config: StoreConfig) -> Self {
        let tiers = TierService::new(db.clone());
        let vouchers = VoucherService::new(db.clone());
        let checkout = CheckoutService::new(
            db.clone(),
            config.clone(),
            tiers.clone(),
            vouchers.clone(),
        );
        let orders = OrderService::new(db.clone(), config.clone());

        Engine {
            tiers,
            vouchers,
            checkout,
            orders,
            config,
            db,
        }
    }

    /// Starts the periodic advisory expiry sweep.
    pub fn start_expiry_sweep(&self) -> SweepHandle {
        spawn_expiry_sweep(self.db.clone(), self.config.sweep_interval)
    }

    /// Whether the underlying database answers queries.
    pub async fn health_check(&self) -> bool {
        self.db.health_check().await
    }
}

// =============================================================================
// Integration-Style Tests
// =============================================================================
