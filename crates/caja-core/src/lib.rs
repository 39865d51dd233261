//! # caja-core: Pure Business Logic for the Caja POS Core
//!
//! This crate is the **heart** of the POS transactional core. It contains
//! the domain model and business rules as pure code with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Adapters (HTTP / UI - out of scope here)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │money / tax│  │ validation│  │ capability│   │   │
//! │  │   │  Product  │  │   Money   │  │   rules   │  │   seam    │   │   │
//! │  │   │  Kardex   │  │ TaxPolicy │  │  checks   │  │   trait   │   │   │
//! │  │   │  Drawer   │  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │   │  Sale ... │                                                │   │
//! │  │   └───────────┘                                                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                caja-db (Persistence + Services)                 │   │
//! │  │    Inventory Ledger • Cash Drawer Manager • Sale Coordinator    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, KardexEntry, CashDrawer, Sale, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`tax`] - The configurable subtotal-to-tax rule
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Input validation
//! - [`capability`] - The injected auth seam

// =============================================================================
// Module Declarations
// =============================================================================

pub mod capability;
pub mod error;
pub mod money;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use capability::{AllowAll, Capabilities};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use tax::{TaxPolicy, TaxRate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single sale line or stock movement.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Default close-reconciliation tolerance: differences of at most this
/// many cents are classified MINOR rather than MAJOR.
///
/// ## Business Reason
/// Coin-rounding drift of under a dollar per shift is routine; anything
/// larger is flagged for a manager. Overridable per drawer manager.
pub const DEFAULT_CLOSE_TOLERANCE_CENTS: i64 = 100;
