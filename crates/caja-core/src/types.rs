//! # Domain Types
//!
//! Canonical typed model for the Caja POS transactional core.
//!
//! ## The Three Ledgers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌───────────────────┐  ┌───────────────────┐  ┌───────────────────┐   │
//! │  │   Inventory       │  │   Cash Drawer     │  │   Sale            │   │
//! │  │  ───────────────  │  │  ───────────────  │  │  ───────────────  │   │
//! │  │  Product          │  │  CashDrawer       │  │  Sale             │   │
//! │  │  KardexEntry      │  │  CashMovement     │  │  SaleLine         │   │
//! │  │  MovementType     │  │  MovementKind     │  │  Payment          │   │
//! │  └───────────────────┘  └───────────────────┘  └───────────────────┘   │
//! │                                                                         │
//! │  A checkout touches all three; the coordinator applies its effects as   │
//! │  one atomic unit so no ledger ever reflects half a sale.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is the single canonical model at the core boundary. Mapping to any
//! external naming convention (camelCase wire formats, legacy snake_case
//! duplicates) belongs in an adapter, never here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A catalog product with its current on-hand stock.
///
/// `stock_on_hand` is owned by the inventory ledger: the only legal way to
/// change it is a kardex movement, which keeps the replay invariant
/// (`stock_on_hand == initial + Σ signed kardex deltas`) checkable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Current on-hand quantity. Never negative.
    pub stock_on_hand: i64,

    /// Acquisition cost in cents (for valuation).
    pub cost_cents: i64,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Reorder threshold; at or below this the product is "critical".
    pub stock_min: i64,

    /// Target ceiling for restocking.
    pub stock_max: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the cost price as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// True when stock is at or below the reorder threshold.
    #[inline]
    pub fn is_critical(&self) -> bool {
        self.stock_on_hand <= self.stock_min
    }
}

// =============================================================================
// Kardex (inventory movement ledger)
// =============================================================================

/// The kind of inventory movement recorded in the kardex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received (purchase, restock).
    In,
    /// Goods leaving outside a sale (breakage, manual withdrawal,
    /// downward correction).
    Out,
    /// Decrement caused by a completed sale.
    Sale,
    /// Compensating increment from a cancelled sale.
    Return,
    /// Upward stock correction after a physical count.
    Adjust,
}

impl MovementType {
    /// The signed stock delta this movement applies, given a positive
    /// quantity. Out/Sale remove stock; In/Return/Adjust add it.
    #[inline]
    pub const fn signed_delta(&self, quantity: i64) -> i64 {
        match self {
            MovementType::Out | MovementType::Sale => -quantity,
            MovementType::In | MovementType::Return | MovementType::Adjust => quantity,
        }
    }
}

/// An immutable row in the inventory movement ledger.
///
/// Invariant: `stock_after = stock_before + movement_type.signed_delta(quantity)`.
/// Entries are never updated or deleted once written; corrections are new
/// compensating entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct KardexEntry {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Magnitude of the movement, always positive; direction comes from
    /// the movement type.
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    /// Operator who caused the movement.
    pub actor_id: String,
    /// Free-form note or linked document id (e.g. the sale id).
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Drawer
// =============================================================================

/// Drawer lifecycle state. `Closed` is terminal; a new shift opens a new
/// drawer row, it never reopens an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DrawerState {
    Open,
    Closed,
}

/// A cash register session owned by one operator for one business day.
///
/// While Open, the three running totals reflect exactly the payments of
/// completed sales attributed to this drawer plus manual cash movements.
/// Once Closed the row is immutable except for audit annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashDrawer {
    pub id: String,
    pub operator_id: String,
    /// Calendar day (UTC, `YYYY-MM-DD`) the drawer belongs to; part of the
    /// one-open-drawer-per-operator-per-day uniqueness key.
    pub business_day: String,
    pub state: DrawerState,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Opening float counted into the drawer.
    pub initial_cents: i64,
    /// Running total of cash payments plus net manual movements.
    pub cash_total_cents: i64,
    /// Running total of card payments.
    pub card_total_cents: i64,
    /// Running total of QR/wallet payments.
    pub qr_total_cents: i64,
    pub counted_cash_cents: Option<i64>,
    pub counted_card_cents: Option<i64>,
    pub counted_qr_cents: Option<i64>,
    /// Set at close: counted minus expected.
    pub difference_cents: Option<i64>,
    pub notes: Option<String>,
}

impl CashDrawer {
    /// Sum of the three running totals: what an EGRESO may draw against.
    #[inline]
    pub fn available_cents(&self) -> i64 {
        self.cash_total_cents + self.card_total_cents + self.qr_total_cents
    }

    /// What the close count should find: opening float plus all recorded
    /// activity.
    #[inline]
    pub fn expected_cents(&self) -> i64 {
        self.initial_cents + self.available_cents()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == DrawerState::Open
    }
}

/// Direction of a manual cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Cash put into the drawer outside a sale.
    Ingreso,
    /// Cash taken out of the drawer. May not drive the available balance
    /// negative.
    Egreso,
}

/// A manual cash movement against an open drawer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashMovement {
    pub id: String,
    pub drawer_id: String,
    pub kind: MovementKind,
    pub amount_cents: i64,
    pub reason: String,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Close-time verdict comparing counted against expected amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// Counted exactly matches expected.
    Balanced,
    /// Difference within the configured tolerance.
    Minor,
    /// Difference beyond tolerance; needs manager attention.
    Major,
}

impl ReconciliationStatus {
    /// Classifies a difference against a tolerance (both in cents).
    pub fn classify(difference_cents: i64, tolerance_cents: i64) -> Self {
        if difference_cents == 0 {
            ReconciliationStatus::Balanced
        } else if difference_cents.abs() <= tolerance_cents {
            ReconciliationStatus::Minor
        } else {
            ReconciliationStatus::Major
        }
    }
}

/// Outcome of closing a drawer. Reports drift; never corrects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub drawer_id: String,
    pub expected_cents: i64,
    pub actual_cents: i64,
    pub difference_cents: i64,
    pub status: ReconciliationStatus,
}

// =============================================================================
// Sale
// =============================================================================

/// Sale lifecycle. Written once as Completed; the only later transition is
/// Completed -> Cancelled, which appends compensating kardex entries and
/// reverses the drawer totals - rows are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Cancelled,
}

/// A checkout transaction tied to a drawer.
///
/// Invariants: `subtotal = Σ line totals`, `total = subtotal + tax`,
/// `paid >= total`, `change = paid - total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub drawer_id: String,
    pub operator_id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub change_cents: i64,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
}

/// A line item in a sale. Snapshots the unit price at sale time so later
/// catalog edits don't rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `quantity × unit_price_cents`.
    pub line_total_cents: i64,
}

// =============================================================================
// Payment
// =============================================================================

/// How a sale was paid. Wallet methods are QR-code mobile channels; the
/// specific brands are external integration details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    WalletA,
    WalletB,
}

/// The drawer running-total bucket a payment method accumulates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerBucket {
    Cash,
    Card,
    Qr,
}

impl PaymentMethod {
    /// Both wallet channels settle through the QR bucket.
    #[inline]
    pub const fn drawer_bucket(&self) -> DrawerBucket {
        match self {
            PaymentMethod::Cash => DrawerBucket::Cash,
            PaymentMethod::Card => DrawerBucket::Card,
            PaymentMethod::WalletA | PaymentMethod::WalletB => DrawerBucket::Qr,
        }
    }
}

/// A payment towards a sale. Split tender means multiple rows per sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// External reference (card auth code, wallet transaction id).
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Requests and Receipts
// =============================================================================

/// One requested line of a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// One tendered payment of a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<String>,
}

/// What the coordinator returns for a successful checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub change_cents: i64,
}

/// What the coordinator returns for a successful cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReceipt {
    pub sale_id: String,
    /// Units returned to stock across all lines.
    pub restocked_units: i64,
    /// Payment cents backed out of the drawer running totals.
    pub reversed_cents: i64,
}

/// What the ledger returns for an applied movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementReceipt {
    pub entry_id: String,
    pub stock_after: i64,
}

/// Inventory valuation aggregate (best-effort snapshot).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StockValuation {
    pub cost_total_cents: i64,
    pub sell_total_cents: i64,
    pub unit_count: i64,
    pub product_count: i64,
}

// =============================================================================
// Checkout Policies
// =============================================================================

/// What the coordinator does when a checkout arrives without an open
/// drawer for the operator.
///
/// Auto-creating a zero-balance drawer is a shortcut some deployments
/// want; it is an explicit, configured decision here - never a silent
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawerPolicy {
    /// Fail the checkout with DrawerNotOpen.
    #[default]
    RequireOpen,
    /// Open a zero-balance drawer for the operator and proceed.
    AutoOpen,
}

/// Configuration for the sale coordinator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutPolicy {
    /// The subtotal-to-tax rule. Default: zero-rated.
    pub tax: crate::tax::TaxPolicy,
    /// Drawerless-checkout handling. Default: require an open drawer.
    pub drawer: DrawerPolicy,
}

// =============================================================================
// Unit Tests
// =============================================================================
