//! # Repository Module
//!
//! Row-level database access for Caja POS.
//!
//! ## Repository vs Service
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repositories: single-table row access (catalog CRUD, lookups)         │
//! │  Services:     multi-table transactional units (ledger, drawer,        │
//! │                checkout) - see the service module                       │
//! │                                                                         │
//! │  The split is deliberate: ProductRepository exposes NO way to write     │
//! │  stock_on_hand. Every stock mutation goes through the inventory        │
//! │  ledger so the kardex replay invariant stays enforceable.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod product;
