//! # Cash Drawer Manager
//!
//! Owns the open/operate/close state machine per operator, the running
//! balances per payment method, and end-of-shift reconciliation.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   (no drawer) ──open()──► OPEN ──close()──► CLOSED (terminal)           │
//! │                            │                                            │
//! │                            ├── recordPayment (coordinator only)         │
//! │                            └── addMovement   (INGRESO / EGRESO)         │
//! │                                                                         │
//! │  CLOSED never reopens: a new shift opens a NEW drawer row.              │
//! │                                                                         │
//! │  Uniqueness: at most one OPEN drawer per (operator, business day),      │
//! │  enforced by a partial unique index INSIDE the insert - not a           │
//! │  read-then-write, which would race.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Close is the audit gate: it reports drift between counted and expected
//! amounts, it never corrects it.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use caja_core::validation::{validate_amount_cents, validate_id, validate_non_negative_cents};
use caja_core::{
    Capabilities, CashDrawer, CashMovement, CoreError, DrawerBucket, DrawerState, MovementKind,
    PaymentMethod, ReconciliationResult, ReconciliationStatus,
};

use crate::error::DbError;
use crate::service::ServiceResult;

/// SELECT column list shared by drawer reads.
const DRAWER_COLUMNS: &str = "id, operator_id, business_day, state, opened_at, closed_at, \
     initial_cents, cash_total_cents, card_total_cents, qr_total_cents, \
     counted_cash_cents, counted_card_cents, counted_qr_cents, difference_cents, notes";

/// The business day a timestamp belongs to (UTC calendar date).
fn business_day(now: DateTime<Utc>) -> String {
    now.date_naive().to_string()
}

/// The running-total column a payment bucket accumulates into.
/// Fixed strings only; never interpolate caller input into SQL.
const fn bucket_column(bucket: DrawerBucket) -> &'static str {
    match bucket {
        DrawerBucket::Cash => "cash_total_cents",
        DrawerBucket::Card => "card_total_cents",
        DrawerBucket::Qr => "qr_total_cents",
    }
}

// =============================================================================
// Transaction-Scoped Primitives
// =============================================================================

/// Inserts a new OPEN drawer row on an existing transaction.
///
/// The partial unique index on (operator_id, business_day) WHERE state =
/// 'open' makes this the race-proof uniqueness check: a second concurrent
/// open hits the constraint inside its own insert.
pub(crate) async fn open_drawer_on(
    conn: &mut SqliteConnection,
    operator_id: &str,
    initial_cents: i64,
) -> ServiceResult<CashDrawer> {
    validate_id("operator_id", operator_id)?;
    validate_non_negative_cents("initial_amount", initial_cents)?;

    let now = Utc::now();
    let drawer = CashDrawer {
        id: Uuid::new_v4().to_string(),
        operator_id: operator_id.to_string(),
        business_day: business_day(now),
        state: DrawerState::Open,
        opened_at: now,
        closed_at: None,
        initial_cents,
        cash_total_cents: 0,
        card_total_cents: 0,
        qr_total_cents: 0,
        counted_cash_cents: None,
        counted_card_cents: None,
        counted_qr_cents: None,
        difference_cents: None,
        notes: None,
    };

    let inserted = sqlx::query(
        r#"
        INSERT INTO cash_drawers (
            id, operator_id, business_day, state, opened_at, initial_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&drawer.id)
    .bind(&drawer.operator_id)
    .bind(&drawer.business_day)
    .bind(drawer.state)
    .bind(drawer.opened_at)
    .bind(drawer.initial_cents)
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => Ok(drawer),
        Err(e) => {
            let db_err = DbError::from(e);
            if matches!(db_err, DbError::UniqueViolation { .. }) {
                let existing: Option<String> = sqlx::query_scalar(
                    "SELECT id FROM cash_drawers \
                     WHERE operator_id = ?1 AND business_day = ?2 AND state = 'open'",
                )
                .bind(operator_id)
                .bind(&drawer.business_day)
                .fetch_optional(&mut *conn)
                .await?;

                Err(CoreError::DrawerAlreadyOpen {
                    operator_id: operator_id.to_string(),
                    drawer_id: existing.unwrap_or_default(),
                }
                .into())
            } else {
                Err(db_err.into())
            }
        }
    }
}

/// Adds a completed-sale payment to the matching running total.
///
/// Only the sale coordinator calls this, inside its atomic scope; the
/// drawer-vs-payments invariant depends on the bump committing together
/// with the payment row.
pub(crate) async fn record_payment_on(
    conn: &mut SqliteConnection,
    drawer_id: &str,
    method: PaymentMethod,
    amount_cents: i64,
) -> ServiceResult<()> {
    let column = bucket_column(method.drawer_bucket());

    let result = sqlx::query(&format!(
        "UPDATE cash_drawers SET {column} = {column} + ?2 WHERE id = ?1 AND state = 'open'"
    ))
    .bind(drawer_id)
    .bind(amount_cents)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let operator: Option<String> =
            sqlx::query_scalar("SELECT operator_id FROM cash_drawers WHERE id = ?1")
                .bind(drawer_id)
                .fetch_optional(&mut *conn)
                .await?;

        return Err(match operator {
            Some(operator_id) => CoreError::DrawerNotOpen { operator_id }.into(),
            None => CoreError::DrawerNotFound(drawer_id.to_string()).into(),
        });
    }

    Ok(())
}

/// Backs a cancelled sale's payment out of the running totals.
///
/// Returns false (and reverses nothing) when the drawer has already been
/// closed: a closed drawer is immutable and its reconciliation already
/// counted the money; the cancellation still restocks and flips the sale.
pub(crate) async fn reverse_payment_on(
    conn: &mut SqliteConnection,
    drawer_id: &str,
    method: PaymentMethod,
    amount_cents: i64,
) -> ServiceResult<bool> {
    let column = bucket_column(method.drawer_bucket());

    let result = sqlx::query(&format!(
        "UPDATE cash_drawers SET {column} = {column} - ?2 WHERE id = ?1 AND state = 'open'"
    ))
    .bind(drawer_id)
    .bind(amount_cents)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        warn!(
            drawer_id = %drawer_id,
            amount = %amount_cents,
            "Payment reversal skipped: drawer already closed"
        );
        return Ok(false);
    }

    Ok(true)
}

// =============================================================================
// Cash Drawer Manager
// =============================================================================

/// Service owning the drawer lifecycle and its running balances.
#[derive(Clone)]
pub struct CashDrawerManager {
    pool: SqlitePool,
    capabilities: Arc<dyn Capabilities>,
    /// Close differences up to this many cents classify MINOR.
    tolerance_cents: i64,
}

impl CashDrawerManager {
    /// Creates a new CashDrawerManager.
    pub fn new(pool: SqlitePool, capabilities: Arc<dyn Capabilities>, tolerance_cents: i64) -> Self {
        CashDrawerManager {
            pool,
            capabilities,
            tolerance_cents,
        }
    }

    /// Opens a drawer for the operator's current business day.
    ///
    /// ## Failures
    /// - `Forbidden` - the capability check denied the operator
    /// - `ValidationError` - negative initial amount
    /// - `DrawerAlreadyOpen` - the operator already holds an OPEN drawer
    ///   today (also the loser of a concurrent double-open)
    pub async fn open(&self, operator_id: &str, initial_cents: i64) -> ServiceResult<CashDrawer> {
        if !self.capabilities.can_open_drawer(operator_id) {
            return Err(CoreError::Forbidden {
                operator_id: operator_id.to_string(),
                action: "open a cash drawer",
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let drawer = open_drawer_on(&mut tx, operator_id, initial_cents).await?;
        tx.commit().await?;

        info!(
            drawer_id = %drawer.id,
            operator_id = %operator_id,
            initial = %initial_cents,
            "Drawer opened"
        );

        Ok(drawer)
    }

    /// Gets a drawer by ID.
    pub async fn get(&self, drawer_id: &str) -> ServiceResult<CashDrawer> {
        let drawer = sqlx::query_as::<_, CashDrawer>(&format!(
            "SELECT {DRAWER_COLUMNS} FROM cash_drawers WHERE id = ?1"
        ))
        .bind(drawer_id)
        .fetch_optional(&self.pool)
        .await?;

        drawer.ok_or_else(|| CoreError::DrawerNotFound(drawer_id.to_string()).into())
    }

    /// The operator's currently OPEN drawer, if any (most recent first,
    /// covering shifts that straddle midnight).
    pub async fn open_drawer_for(&self, operator_id: &str) -> ServiceResult<Option<CashDrawer>> {
        let drawer = sqlx::query_as::<_, CashDrawer>(&format!(
            "SELECT {DRAWER_COLUMNS} FROM cash_drawers \
             WHERE operator_id = ?1 AND state = 'open' \
             ORDER BY opened_at DESC LIMIT 1"
        ))
        .bind(operator_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(drawer)
    }

    /// Records a manual cash movement against an open drawer.
    ///
    /// INGRESO adds to the cash bucket; EGRESO subtracts from it, guarded
    /// so the drawer's available balance (sum of the three running
    /// totals) never goes negative. Movement row and total update commit
    /// together.
    pub async fn add_movement(
        &self,
        drawer_id: &str,
        kind: MovementKind,
        amount_cents: i64,
        reason: &str,
        actor_id: &str,
    ) -> ServiceResult<CashMovement> {
        validate_amount_cents("amount", amount_cents)?;
        validate_id("reason", reason)?;

        let mut tx = self.pool.begin().await?;

        let result = match kind {
            MovementKind::Ingreso => {
                sqlx::query(
                    "UPDATE cash_drawers SET cash_total_cents = cash_total_cents + ?2 \
                     WHERE id = ?1 AND state = 'open'",
                )
                .bind(drawer_id)
                .bind(amount_cents)
                .execute(&mut *tx)
                .await?
            }
            MovementKind::Egreso => {
                // Guarded: the balance check and the subtraction are one
                // statement.
                sqlx::query(
                    "UPDATE cash_drawers SET cash_total_cents = cash_total_cents - ?2 \
                     WHERE id = ?1 AND state = 'open' \
                     AND cash_total_cents + card_total_cents + qr_total_cents >= ?2",
                )
                .bind(drawer_id)
                .bind(amount_cents)
                .execute(&mut *tx)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            let drawer = sqlx::query_as::<_, CashDrawer>(&format!(
                "SELECT {DRAWER_COLUMNS} FROM cash_drawers WHERE id = ?1"
            ))
            .bind(drawer_id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match drawer {
                None => CoreError::DrawerNotFound(drawer_id.to_string()).into(),
                Some(d) if !d.is_open() => CoreError::DrawerNotOpen {
                    operator_id: d.operator_id,
                }
                .into(),
                Some(d) => CoreError::InsufficientFunds {
                    available_cents: d.available_cents(),
                    requested_cents: amount_cents,
                }
                .into(),
            });
        }

        let movement = CashMovement {
            id: Uuid::new_v4().to_string(),
            drawer_id: drawer_id.to_string(),
            kind,
            amount_cents,
            reason: reason.to_string(),
            actor_id: actor_id.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_movements (
                id, drawer_id, kind, amount_cents, reason, actor_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.drawer_id)
        .bind(movement.kind)
        .bind(movement.amount_cents)
        .bind(&movement.reason)
        .bind(&movement.actor_id)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            drawer_id = %drawer_id,
            kind = ?kind,
            amount = %amount_cents,
            "Cash movement recorded"
        );

        Ok(movement)
    }

    /// Closes a drawer and reconciles counted against expected amounts.
    ///
    /// `expected = initial + cash + card + qr` (the running totals
    /// already reflect sales and manual movements); `difference =
    /// counted - expected`. Differences are reported, never corrected.
    ///
    /// ## Failures
    /// - `DrawerNotFound` - unknown id
    /// - `AlreadyClosed` - close is not idempotent by design: the first
    ///   close stands and the second caller is told so
    pub async fn close(
        &self,
        drawer_id: &str,
        counted_cash_cents: i64,
        counted_card_cents: i64,
        counted_qr_cents: i64,
        notes: Option<&str>,
    ) -> ServiceResult<ReconciliationResult> {
        validate_non_negative_cents("counted_cash", counted_cash_cents)?;
        validate_non_negative_cents("counted_card", counted_card_cents)?;
        validate_non_negative_cents("counted_qr", counted_qr_cents)?;

        let mut tx = self.pool.begin().await?;

        let drawer = sqlx::query_as::<_, CashDrawer>(&format!(
            "SELECT {DRAWER_COLUMNS} FROM cash_drawers WHERE id = ?1"
        ))
        .bind(drawer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::DrawerNotFound(drawer_id.to_string()))?;

        if !drawer.is_open() {
            return Err(CoreError::AlreadyClosed {
                drawer_id: drawer_id.to_string(),
            }
            .into());
        }

        let expected_cents = drawer.expected_cents();
        let actual_cents = counted_cash_cents + counted_card_cents + counted_qr_cents;
        let difference_cents = actual_cents - expected_cents;
        let status = ReconciliationStatus::classify(difference_cents, self.tolerance_cents);

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE cash_drawers SET
                state = 'closed',
                closed_at = ?2,
                counted_cash_cents = ?3,
                counted_card_cents = ?4,
                counted_qr_cents = ?5,
                difference_cents = ?6,
                notes = ?7
            WHERE id = ?1 AND state = 'open'
            "#,
        )
        .bind(drawer_id)
        .bind(now)
        .bind(counted_cash_cents)
        .bind(counted_card_cents)
        .bind(counted_qr_cents)
        .bind(difference_cents)
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        // Lost a race with another close between the read and the update.
        if result.rows_affected() == 0 {
            return Err(CoreError::AlreadyClosed {
                drawer_id: drawer_id.to_string(),
            }
            .into());
        }

        tx.commit().await?;

        info!(
            drawer_id = %drawer_id,
            expected = %expected_cents,
            actual = %actual_cents,
            difference = %difference_cents,
            status = ?status,
            "Drawer closed"
        );

        Ok(ReconciliationResult {
            drawer_id: drawer_id.to_string(),
            expected_cents,
            actual_cents,
            difference_cents,
            status,
        })
    }

    /// Manual cash movements for a drawer, oldest first.
    pub async fn movements(&self, drawer_id: &str) -> ServiceResult<Vec<CashMovement>> {
        let movements = sqlx::query_as::<_, CashMovement>(
            r#"
            SELECT id, drawer_id, kind, amount_cents, reason, actor_id, created_at
            FROM cash_movements
            WHERE drawer_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(drawer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

impl std::fmt::Debug for CashDrawerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CashDrawerManager")
            .field("tolerance_cents", &self.tolerance_cents)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
