//! # Repository Module
//!
//! Database repository implementations for the Emporia checkout engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service Layer (emporia-engine)                                         │
//! │       │                                                                 │
//! │       │  db.vouchers().increment_used("SUMMER10")                       │
//! │       ▼                                                                 │
//! │  VoucherRepository                                                      │
//! │  ├── get_by_code(&self, code)                                           │
//! │  ├── insert(&self, voucher)                                             │
//! │  ├── increment_used(&self, code)   ◄── conditional UPDATE               │
//! │  └── decrement_used(&self, code)                                        │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Every mutable counter or flag (points, used_count, is_used, status)   │
//! │  moves through a single conditional UPDATE in exactly one repository   │
//! │  method; rows_affected == 0 is the failure signal. No repository       │
//! │  reads a value to decide whether to write it.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod order;
pub mod redeemed;
pub mod reward;
pub mod tier;
pub mod voucher;
