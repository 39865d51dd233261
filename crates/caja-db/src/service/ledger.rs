//! # Inventory Ledger
//!
//! The only path allowed to change stock quantity.
//!
//! ## Why a Single Choke Point
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The original design updated the stock column from four call sites     │
//! │  (sale, entrada, salida, cancel) with no shared bookkeeping. Stock     │
//! │  and history drifted apart silently.                                   │
//! │                                                                        │
//! │  Here, every mutation is one atomic pair:                              │
//! │                                                                        │
//! │    UPDATE products ...        ┐                                        │
//! │    INSERT INTO kardex ...     ┘ same transaction, never one without    │
//! │                                 the other                              │
//! │                                                                        │
//! │  which makes the replay invariant checkable at any time:               │
//! │    stock_on_hand == initial_stock + Σ(signed kardex deltas)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization Point
//! For Out/Sale the check-then-decrement is a single guarded UPDATE
//! (`... AND stock_on_hand >= ?`). Two concurrent sales racing for the
//! last unit cannot both pass: the second one's UPDATE matches zero rows
//! and surfaces `InsufficientStock`.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use caja_core::validation::validate_quantity;
use caja_core::{CoreError, KardexEntry, MovementReceipt, MovementType, Product, StockValuation};

use crate::service::ServiceResult;

/// SELECT column list shared by product reads in this module.
const PRODUCT_COLUMNS: &str = "id, name, stock_on_hand, cost_cents, price_cents, \
     stock_min, stock_max, is_active, created_at, updated_at";

// =============================================================================
// Transaction-Scoped Primitive
// =============================================================================

/// Applies one stock movement on an existing transaction.
///
/// This is the serialization point for all stock writes. The sale
/// coordinator calls it per line inside its own atomic scope; the public
/// [`InventoryLedger::apply_movement`] wraps it in a transaction of its
/// own.
///
/// Decrements require an active product; increments (Return from a
/// cancellation) also apply to soft-deleted products so a cancel never
/// strands stock.
pub(crate) async fn apply_movement_on(
    conn: &mut SqliteConnection,
    product_id: &str,
    movement_type: MovementType,
    quantity: i64,
    actor_id: &str,
    reference: Option<&str>,
) -> ServiceResult<MovementReceipt> {
    validate_quantity("quantity", quantity)?;

    let delta = movement_type.signed_delta(quantity);
    let now = Utc::now();

    if delta < 0 {
        // Guarded decrement: the stock-sufficiency check and the write are
        // one statement, so no interleaving can oversell.
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_on_hand = stock_on_hand - ?2, updated_at = ?3
            WHERE id = ?1 AND is_active = 1 AND stock_on_hand >= ?2
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "not enough" from "no such product".
            let available: Option<i64> = sqlx::query_scalar(
                "SELECT stock_on_hand FROM products WHERE id = ?1 AND is_active = 1",
            )
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

            return Err(match available {
                Some(available) => CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available,
                    requested: quantity,
                }
                .into(),
                None => CoreError::ProductNotFound(product_id.to_string()).into(),
            });
        }
    } else {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_on_hand = stock_on_hand + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
    }

    let stock_after: i64 = sqlx::query_scalar("SELECT stock_on_hand FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;
    let stock_before = stock_after - delta;

    let entry_id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO kardex (
            id, product_id, movement_type, quantity,
            stock_before, stock_after, actor_id, reference, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&entry_id)
    .bind(product_id)
    .bind(movement_type)
    .bind(quantity)
    .bind(stock_before)
    .bind(stock_after)
    .bind(actor_id)
    .bind(reference)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %product_id,
        movement = ?movement_type,
        quantity = %quantity,
        stock_after = %stock_after,
        "Movement applied"
    );

    Ok(MovementReceipt {
        entry_id,
        stock_after,
    })
}

// =============================================================================
// Inventory Ledger
// =============================================================================

/// Service owning all stock mutation and the kardex audit trail.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    /// Creates a new InventoryLedger.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    /// Applies one stock movement as its own atomic unit.
    ///
    /// ## Preconditions
    /// - `quantity > 0` (direction comes from the movement type)
    /// - For Out/Sale: `quantity <= current stock`, else
    ///   `InsufficientStock { available }`
    /// - Product must exist, else `ProductNotFound`
    ///
    /// ## Effect
    /// Product row update and kardex append commit together or not at
    /// all.
    pub async fn apply_movement(
        &self,
        product_id: &str,
        movement_type: MovementType,
        quantity: i64,
        actor_id: &str,
        reference: Option<&str>,
    ) -> ServiceResult<MovementReceipt> {
        let mut tx = self.pool.begin().await?;

        let receipt = apply_movement_on(
            &mut tx,
            product_id,
            movement_type,
            quantity,
            actor_id,
            reference,
        )
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            movement = ?movement_type,
            quantity = %quantity,
            stock_after = %receipt.stock_after,
            "Stock movement committed"
        );

        Ok(receipt)
    }

    /// Active products at or below their reorder threshold
    /// (snapshot-consistent single query).
    pub async fn critical_stock(&self) -> ServiceResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE is_active = 1 AND stock_on_hand <= stock_min
            ORDER BY name
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inventory valuation across active products. Best-effort snapshot;
    /// not required to be point-in-time consistent with in-flight sales.
    pub async fn valuation(&self) -> ServiceResult<StockValuation> {
        let row: (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(cost_cents * stock_on_hand), 0),
                COALESCE(SUM(price_cents * stock_on_hand), 0),
                COALESCE(SUM(stock_on_hand), 0),
                COUNT(*)
            FROM products
            WHERE is_active = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StockValuation {
            cost_total_cents: row.0,
            sell_total_cents: row.1,
            unit_count: row.2,
            product_count: row.3,
        })
    }

    /// Movement history for a product, newest first.
    pub async fn kardex(&self, product_id: &str, limit: u32) -> ServiceResult<Vec<KardexEntry>> {
        let entries = sqlx::query_as::<_, KardexEntry>(
            r#"
            SELECT id, product_id, movement_type, quantity,
                   stock_before, stock_after, actor_id, reference, created_at
            FROM kardex
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
