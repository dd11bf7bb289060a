//! # Store Configuration
//!
//! Store-wide constants for the engine's services.
//!
//! ## Configuration Surface
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        StoreConfig                                      │
//! │                                                                         │
//! │  pricing                                                                │
//! │  ├── flat_shipping_fee            20,000  (below threshold)             │
//! │  ├── base_free_shipping_threshold 500,000 (tiers may REPLACE this)      │
//! │  └── points_per_unit              10,000  (1 point per 10,000 units)    │
//! │                                                                         │
//! │  retry_limit       3       bounded retries for transient DB conflicts  │
//! │  sweep_interval    1 hour  expired-voucher display cleanup cadence     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The defaults mirror the observed store configuration; deployments
//! override individual fields through the builder methods.

use std::time::Duration;

use emporia_core::PricingConfig;

/// Store-wide engine configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = StoreConfig::default()
///     .retry_limit(5)
///     .sweep_interval(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Pricing constants fed to the discount composer.
    pub pricing: PricingConfig,

    /// Maximum retries for transient storage conflicts (locked database,
    /// exhausted pool). Exhaustion surfaces as a typed transient failure.
    pub retry_limit: u32,

    /// Cadence of the advisory expired-voucher sweep.
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            pricing: PricingConfig::default(),
            retry_limit: 3,
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl StoreConfig {
    /// Sets the pricing constants.
    pub fn pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    /// Sets the transient-conflict retry limit.
    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Sets the expiry-sweep cadence.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
