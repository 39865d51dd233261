//! # Sale Transaction Coordinator
//!
//! Ties a checkout to the inventory ledger and the cash drawer as one
//! atomic unit.
//!
//! ## Effect Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale                          cancel_sale                       │
//! │  ───────────                          ───────────                       │
//! │  BEGIN                                BEGIN                             │
//! │    resolve drawer                       flip sale -> cancelled          │
//! │    INSERT sale (completed)              per line:                       │
//! │    per line:                              Return movement (restock)     │
//! │      INSERT sale_line                   per payment:                    │
//! │      Sale movement (guarded             reverse drawer bucket           │
//! │      stock decrement + kardex)            (skipped if drawer closed)    │
//! │    per payment:                       COMMIT                            │
//! │      INSERT payment                                                     │
//! │      bump drawer bucket                                                 │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  One transaction each. Insufficient stock on line 3 of 5 leaves         │
//! │  nothing behind: no sale row, no kardex entries, no payments, no        │
//! │  drawer change.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation compensates, never erases: the original sale row, its
//! kardex entries and its payments all survive; Return movements and
//! bucket reversals are appended on top.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use caja_core::validation::validate_sale_request;
use caja_core::{
    Capabilities, CancelReceipt, CheckoutPolicy, CoreError, DrawerPolicy, LineRequest, Money,
    MovementType, Payment, PaymentRequest, Sale, SaleLine, SaleReceipt, SaleStatus,
};

use crate::service::drawer::{open_drawer_on, record_payment_on, reverse_payment_on};
use crate::service::ledger::apply_movement_on;
use crate::service::ServiceResult;

/// SELECT column list shared by sale reads.
const SALE_COLUMNS: &str = "id, drawer_id, operator_id, status, subtotal_cents, tax_cents, \
     total_cents, paid_cents, change_cents, created_at, cancelled_at, cancelled_by";

// =============================================================================
// Sale Coordinator
// =============================================================================

/// Service that executes checkouts and cancellations atomically across the
/// inventory and drawer ledgers.
#[derive(Clone)]
pub struct SaleCoordinator {
    pool: SqlitePool,
    policy: CheckoutPolicy,
    capabilities: Arc<dyn Capabilities>,
}

impl SaleCoordinator {
    /// Creates a new SaleCoordinator.
    pub fn new(pool: SqlitePool, policy: CheckoutPolicy, capabilities: Arc<dyn Capabilities>) -> Self {
        SaleCoordinator {
            pool,
            policy,
            capabilities,
        }
    }

    /// Executes a checkout.
    ///
    /// Drawer resolution: an explicit `drawer_id` wins; otherwise the
    /// operator's open drawer is used. With no open drawer the configured
    /// [`DrawerPolicy`] decides between failing (`DrawerNotOpen`) and
    /// opening a zero-balance drawer.
    ///
    /// ## Failures (all leave zero rows behind)
    /// - `Validation` - malformed lines/payments, every problem collected
    /// - `ProductNotFound` / `InsufficientStock` - per line, checked
    ///   inside the guarded decrement
    /// - `InsufficientPayment` - `Σ payments < total`
    /// - `DrawerNotOpen` / `DrawerNotFound` - drawer resolution failed
    pub async fn create_sale(
        &self,
        operator_id: &str,
        drawer_id: Option<&str>,
        lines: &[LineRequest],
        payments: &[PaymentRequest],
    ) -> ServiceResult<SaleReceipt> {
        validate_sale_request(lines, payments)?;

        let mut tx = self.pool.begin().await?;

        let drawer_id = self
            .resolve_drawer(&mut tx, operator_id, drawer_id)
            .await?;

        // Price every line from the catalog before writing anything, so
        // totals can be computed and the payment check can run up front.
        let mut priced: Vec<(String, i64, i64)> = Vec::with_capacity(lines.len());
        let mut subtotal_cents: i64 = 0;
        for line in lines {
            let price: Option<i64> = sqlx::query_scalar(
                "SELECT price_cents FROM products WHERE id = ?1 AND is_active = 1",
            )
            .bind(&line.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let unit_price_cents = price
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
            let line_total_cents = unit_price_cents * line.quantity;
            subtotal_cents += line_total_cents;
            priced.push((line.product_id.clone(), unit_price_cents, line_total_cents));
        }

        let tax_cents = self.policy.tax.tax_for(Money::from_cents(subtotal_cents)).cents();
        let total_cents = subtotal_cents + tax_cents;
        let paid_cents: i64 = payments.iter().map(|p| p.amount_cents).sum();

        if paid_cents < total_cents {
            return Err(CoreError::InsufficientPayment {
                total_cents,
                paid_cents,
            }
            .into());
        }
        let change_cents = paid_cents - total_cents;

        let sale_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, drawer_id, operator_id, status,
                subtotal_cents, tax_cents, total_cents, paid_cents, change_cents,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sale_id)
        .bind(&drawer_id)
        .bind(operator_id)
        .bind(SaleStatus::Completed)
        .bind(subtotal_cents)
        .bind(tax_cents)
        .bind(total_cents)
        .bind(paid_cents)
        .bind(change_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (line, (product_id, unit_price_cents, line_total_cents)) in
            lines.iter().zip(&priced)
        {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    id, sale_id, product_id, quantity, unit_price_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&sale_id)
            .bind(product_id)
            .bind(line.quantity)
            .bind(unit_price_cents)
            .bind(line_total_cents)
            .execute(&mut *tx)
            .await?;

            // Guarded decrement + kardex append. An insufficient-stock or
            // vanished-product failure here aborts the whole checkout.
            apply_movement_on(
                &mut tx,
                product_id,
                MovementType::Sale,
                line.quantity,
                operator_id,
                Some(&sale_id),
            )
            .await?;
        }

        for payment in payments {
            sqlx::query(
                r#"
                INSERT INTO payments (
                    id, sale_id, method, amount_cents, reference, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&sale_id)
            .bind(payment.method)
            .bind(payment.amount_cents)
            .bind(payment.reference.as_deref())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            record_payment_on(&mut tx, &drawer_id, payment.method, payment.amount_cents)
                .await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            drawer_id = %drawer_id,
            operator_id = %operator_id,
            total = %total_cents,
            lines = lines.len(),
            "Sale completed"
        );

        Ok(SaleReceipt {
            sale_id,
            subtotal_cents,
            tax_cents,
            total_cents,
            change_cents,
        })
    }

    /// Cancels a completed sale by compensation.
    ///
    /// Appends a Return movement per original line (restocking the exact
    /// quantities) and backs each payment out of the drawer's running
    /// totals, then flips the sale to Cancelled. If the drawer has
    /// already been closed the totals stay untouched (a closed drawer is
    /// immutable) and `reversed_cents` reports 0; the restock and the
    /// status flip still happen.
    ///
    /// ## Failures
    /// - `Forbidden` - the capability check denied the actor
    /// - `SaleNotFound` - unknown id
    /// - `AlreadyCancelled` - cancellation is not repeatable; the stock
    ///   would come back twice
    pub async fn cancel_sale(&self, sale_id: &str, actor_id: &str) -> ServiceResult<CancelReceipt> {
        if !self.capabilities.can_cancel_sale(actor_id) {
            return Err(CoreError::Forbidden {
                operator_id: actor_id.to_string(),
                action: "cancel a sale",
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        // Status-guarded flip first: it doubles as the race guard, so two
        // concurrent cancels cannot both restock.
        let now = Utc::now();
        let flipped = sqlx::query(
            r#"
            UPDATE sales SET status = 'cancelled', cancelled_at = ?2, cancelled_by = ?3
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(sale_id)
        .bind(now)
        .bind(actor_id)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            let status: Option<SaleStatus> =
                sqlx::query_scalar("SELECT status FROM sales WHERE id = ?1")
                    .bind(sale_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match status {
                Some(SaleStatus::Cancelled) => CoreError::AlreadyCancelled {
                    sale_id: sale_id.to_string(),
                }
                .into(),
                _ => CoreError::SaleNotFound(sale_id.to_string()).into(),
            });
        }

        let drawer_id: String = sqlx::query_scalar("SELECT drawer_id FROM sales WHERE id = ?1")
            .bind(sale_id)
            .fetch_one(&mut *tx)
            .await?;

        let lines = sqlx::query_as::<_, SaleLine>(
            "SELECT id, sale_id, product_id, quantity, unit_price_cents, line_total_cents \
             FROM sale_lines WHERE sale_id = ?1",
        )
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut restocked_units: i64 = 0;
        for line in &lines {
            apply_movement_on(
                &mut tx,
                &line.product_id,
                MovementType::Return,
                line.quantity,
                actor_id,
                Some(sale_id),
            )
            .await?;
            restocked_units += line.quantity;
        }

        let payments = sqlx::query_as::<_, Payment>(
            "SELECT id, sale_id, method, amount_cents, reference, created_at \
             FROM payments WHERE sale_id = ?1",
        )
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut reversed_cents: i64 = 0;
        for payment in &payments {
            let reversed =
                reverse_payment_on(&mut tx, &drawer_id, payment.method, payment.amount_cents)
                    .await?;
            if reversed {
                reversed_cents += payment.amount_cents;
            }
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            actor_id = %actor_id,
            restocked_units = %restocked_units,
            reversed = %reversed_cents,
            "Sale cancelled"
        );

        Ok(CancelReceipt {
            sale_id: sale_id.to_string(),
            restocked_units,
            reversed_cents,
        })
    }

    /// Gets a sale by ID.
    pub async fn get(&self, sale_id: &str) -> ServiceResult<Sale> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        sale.ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }

    /// Line items of a sale.
    pub async fn lines(&self, sale_id: &str) -> ServiceResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(
            "SELECT id, sale_id, product_id, quantity, unit_price_cents, line_total_cents \
             FROM sale_lines WHERE sale_id = ?1",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Payments of a sale.
    pub async fn payments(&self, sale_id: &str) -> ServiceResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT id, sale_id, method, amount_cents, reference, created_at \
             FROM payments WHERE sale_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Resolves the drawer a checkout posts to, inside the checkout's
    /// own transaction.
    async fn resolve_drawer(
        &self,
        conn: &mut SqliteConnection,
        operator_id: &str,
        drawer_id: Option<&str>,
    ) -> ServiceResult<String> {
        if let Some(id) = drawer_id {
            let state: Option<String> =
                sqlx::query_scalar("SELECT state FROM cash_drawers WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;

            return match state.as_deref() {
                Some("open") => Ok(id.to_string()),
                Some(_) => Err(CoreError::DrawerNotOpen {
                    operator_id: operator_id.to_string(),
                }
                .into()),
                None => Err(CoreError::DrawerNotFound(id.to_string()).into()),
            };
        }

        let open: Option<String> = sqlx::query_scalar(
            "SELECT id FROM cash_drawers \
             WHERE operator_id = ?1 AND state = 'open' \
             ORDER BY opened_at DESC LIMIT 1",
        )
        .bind(operator_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(id) = open {
            return Ok(id);
        }

        match self.policy.drawer {
            DrawerPolicy::RequireOpen => Err(CoreError::DrawerNotOpen {
                operator_id: operator_id.to_string(),
            }
            .into()),
            DrawerPolicy::AutoOpen => {
                let drawer = open_drawer_on(conn, operator_id, 0).await?;
                info!(
                    drawer_id = %drawer.id,
                    operator_id = %operator_id,
                    "Zero-balance drawer auto-opened for checkout"
                );
                Ok(drawer.id)
            }
        }
    }
}

impl std::fmt::Debug for SaleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleCoordinator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use caja_core::{PaymentMethod, TaxPolicy, ValidationError};

    async fn test_db() -> Database {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, name: &str, stock: i64, price_cents: i64) -> String {
        db.products()
            .insert(NewProduct {
                name: name.to_string(),
                initial_stock: stock,
                cost_cents: price_cents / 2,
                price_cents,
                stock_min: 1,
                stock_max: 100,
            })
            .await
            .unwrap()
            .id
    }

    fn line(product_id: &str, quantity: i64) -> LineRequest {
        LineRequest {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    fn cash(amount_cents: i64) -> PaymentRequest {
        PaymentRequest {
            method: PaymentMethod::Cash,
            amount_cents,
            reference: None,
        }
    }

    fn card(amount_cents: i64) -> PaymentRequest {
        PaymentRequest {
            method: PaymentMethod::Card,
            amount_cents,
            reference: Some("auth-1234".to_string()),
        }
    }

    #[tokio::test]
    async fn test_checkout_updates_all_three_ledgers() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 2_500).await;
        let drawer = db.drawers().open("op1", 10_000).await.unwrap();

        let receipt = db
            .checkout()
            .create_sale("op1", None, &[line(&product_id, 2)], &[cash(5_000)])
            .await
            .unwrap();

        assert_eq!(receipt.subtotal_cents, 5_000);
        assert_eq!(receipt.tax_cents, 0);
        assert_eq!(receipt.total_cents, 5_000);
        assert_eq!(receipt.change_cents, 0);

        // Stock decremented with a kardex trail
        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_on_hand, 8);
        let entries = db.ledger().kardex(&product_id, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].movement_type, MovementType::Sale);
        assert_eq!(entries[0].reference.as_deref(), Some(receipt.sale_id.as_str()));

        // Drawer cash bucket bumped
        let fetched = db.drawers().get(&drawer.id).await.unwrap();
        assert_eq!(fetched.cash_total_cents, 5_000);
        assert_eq!(fetched.expected_cents(), 15_000);

        // Sale rows persisted
        let sale = db.checkout().get(&receipt.sale_id).await.unwrap();
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.drawer_id, drawer.id);
        assert_eq!(sale.paid_cents, 5_000);
    }

    #[tokio::test]
    async fn test_split_tender_buckets() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 3_000).await;
        let drawer = db.drawers().open("op1", 0).await.unwrap();

        let wallet = PaymentRequest {
            method: PaymentMethod::WalletA,
            amount_cents: 1_000,
            reference: Some("qr-789".to_string()),
        };

        db.checkout()
            .create_sale(
                "op1",
                None,
                &[line(&product_id, 2)],
                &[cash(2_000), card(3_000), wallet],
            )
            .await
            .unwrap();

        let fetched = db.drawers().get(&drawer.id).await.unwrap();
        assert_eq!(fetched.cash_total_cents, 2_000);
        assert_eq!(fetched.card_total_cents, 3_000);
        assert_eq!(fetched.qr_total_cents, 1_000);
    }

    #[tokio::test]
    async fn test_tax_applied() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 10_000).await;
        db.drawers().open("op1", 0).await.unwrap();

        // 13% VAT
        let checkout = db.checkout_with(
            CheckoutPolicy {
                tax: TaxPolicy::new(caja_core::TaxRate::from_bps(1_300)),
                drawer: DrawerPolicy::RequireOpen,
            },
            Arc::new(caja_core::AllowAll),
        );

        let receipt = checkout
            .create_sale("op1", None, &[line(&product_id, 1)], &[cash(11_300)])
            .await
            .unwrap();

        assert_eq!(receipt.subtotal_cents, 10_000);
        assert_eq!(receipt.tax_cents, 1_300);
        assert_eq!(receipt.total_cents, 11_300);
    }

    #[tokio::test]
    async fn test_insufficient_payment() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 2_500).await;
        db.drawers().open("op1", 0).await.unwrap();

        let err = db
            .checkout()
            .create_sale("op1", None, &[line(&product_id, 2)], &[cash(4_999)])
            .await
            .unwrap_err();

        match err.as_domain() {
            Some(CoreError::InsufficientPayment {
                total_cents,
                paid_cents,
            }) => {
                assert_eq!(*total_cents, 5_000);
                assert_eq!(*paid_cents, 4_999);
            }
            other => panic!("expected InsufficientPayment, got {other:?}"),
        }

        // Nothing persisted
        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_on_hand, 10);
    }

    #[tokio::test]
    async fn test_overpayment_returns_change() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 2_500).await;
        db.drawers().open("op1", 0).await.unwrap();

        let receipt = db
            .checkout()
            .create_sale("op1", None, &[line(&product_id, 1)], &[cash(3_000)])
            .await
            .unwrap();

        assert_eq!(receipt.change_cents, 500);
    }

    #[tokio::test]
    async fn test_atomicity_failed_line_leaves_nothing() {
        let db = test_db().await;
        let plenty = seed_product(&db, "Plenty", 10, 1_000).await;
        let scarce = seed_product(&db, "Scarce", 1, 1_000).await;
        let drawer = db.drawers().open("op1", 0).await.unwrap();

        // Line 1 would succeed; line 2 fails on stock. The whole checkout
        // must roll back.
        let err = db
            .checkout()
            .create_sale(
                "op1",
                None,
                &[line(&plenty, 2), line(&scarce, 5)],
                &[cash(7_000)],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { .. })
        ));

        let p = db.products().get_by_id(&plenty).await.unwrap().unwrap();
        assert_eq!(p.stock_on_hand, 10);
        assert!(db.ledger().kardex(&plenty, 10).await.unwrap().is_empty());
        assert!(db.ledger().kardex(&scarce, 10).await.unwrap().is_empty());

        let fetched = db.drawers().get(&drawer.id).await.unwrap();
        assert_eq!(fetched.available_cents(), 0);

        let sale_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sale_count, 0);
    }

    #[tokio::test]
    async fn test_requires_open_drawer_by_default() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 1_000).await;

        let err = db
            .checkout()
            .create_sale("op1", None, &[line(&product_id, 1)], &[cash(1_000)])
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_domain(),
            Some(CoreError::DrawerNotOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_auto_open_policy() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 1_000).await;

        let checkout = db.checkout_with(
            CheckoutPolicy {
                tax: TaxPolicy::zero_rated(),
                drawer: DrawerPolicy::AutoOpen,
            },
            Arc::new(caja_core::AllowAll),
        );

        let receipt = checkout
            .create_sale("op1", None, &[line(&product_id, 1)], &[cash(1_000)])
            .await
            .unwrap();

        let drawer = db.drawers().open_drawer_for("op1").await.unwrap().unwrap();
        assert_eq!(drawer.initial_cents, 0);
        assert_eq!(drawer.cash_total_cents, 1_000);

        let sale = checkout.get(&receipt.sale_id).await.unwrap();
        assert_eq!(sale.drawer_id, drawer.id);
    }

    #[tokio::test]
    async fn test_explicit_drawer_must_be_open() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 1_000).await;
        let drawer = db.drawers().open("op1", 0).await.unwrap();
        db.drawers().close(&drawer.id, 0, 0, 0, None).await.unwrap();

        let err = db
            .checkout()
            .create_sale("op1", Some(&drawer.id), &[line(&product_id, 1)], &[cash(1_000)])
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::DrawerNotOpen { .. })
        ));

        let err = db
            .checkout()
            .create_sale("op1", Some("ghost"), &[line(&product_id, 1)], &[cash(1_000)])
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::DrawerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_validation_collects_all_problems() {
        let db = test_db().await;

        let err = db
            .checkout()
            .create_sale("op1", None, &[line("p1", 0), line("", 1)], &[])
            .await
            .unwrap_err();

        match err.as_domain() {
            Some(CoreError::Validation(ValidationError::Multiple(problems))) => {
                assert_eq!(problems.len(), 3);
            }
            other => panic!("expected grouped validation errors, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_drawer() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 2_500).await;
        let drawer = db.drawers().open("op1", 10_000).await.unwrap();

        let receipt = db
            .checkout()
            .create_sale("op1", None, &[line(&product_id, 3)], &[cash(7_500)])
            .await
            .unwrap();

        let cancel = db
            .checkout()
            .cancel_sale(&receipt.sale_id, "manager1")
            .await
            .unwrap();

        assert_eq!(cancel.restocked_units, 3);
        assert_eq!(cancel.reversed_cents, 7_500);

        // Stock is back, via a compensating Return entry
        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_on_hand, 10);
        let entries = db.ledger().kardex(&product_id, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].movement_type, MovementType::Return);
        assert_eq!(entries[1].movement_type, MovementType::Sale);

        // Drawer totals reversed, back to the opening float
        let fetched = db.drawers().get(&drawer.id).await.unwrap();
        assert_eq!(fetched.cash_total_cents, 0);
        assert_eq!(fetched.expected_cents(), 10_000);

        // Sale row survives as cancelled
        let sale = db.checkout().get(&receipt.sale_id).await.unwrap();
        assert_eq!(sale.status, SaleStatus::Cancelled);
        assert_eq!(sale.cancelled_by.as_deref(), Some("manager1"));
        assert!(sale.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_twice_rejected() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 1_000).await;
        db.drawers().open("op1", 0).await.unwrap();

        let receipt = db
            .checkout()
            .create_sale("op1", None, &[line(&product_id, 1)], &[cash(1_000)])
            .await
            .unwrap();

        db.checkout()
            .cancel_sale(&receipt.sale_id, "op1")
            .await
            .unwrap();
        let err = db
            .checkout()
            .cancel_sale(&receipt.sale_id, "op1")
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_domain(),
            Some(CoreError::AlreadyCancelled { .. })
        ));

        // Stock did not come back twice
        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_on_hand, 10);
    }

    #[tokio::test]
    async fn test_cancel_unknown_sale() {
        let db = test_db().await;
        let err = db.checkout().cancel_sale("ghost", "op1").await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::SaleNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_capability_denied() {
        struct NoCancel;
        impl Capabilities for NoCancel {
            fn can_open_drawer(&self, _: &str) -> bool {
                true
            }
            fn can_cancel_sale(&self, _: &str) -> bool {
                false
            }
        }

        let db = test_db().await;
        let checkout = db.checkout_with(CheckoutPolicy::default(), Arc::new(NoCancel));

        let err = checkout.cancel_sale("any", "cashier1").await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_cancel_after_drawer_close_restocks_without_reversal() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 10, 2_000).await;
        let drawer = db.drawers().open("op1", 0).await.unwrap();

        let receipt = db
            .checkout()
            .create_sale("op1", None, &[line(&product_id, 2)], &[cash(4_000)])
            .await
            .unwrap();

        db.drawers()
            .close(&drawer.id, 4_000, 0, 0, None)
            .await
            .unwrap();

        let cancel = db
            .checkout()
            .cancel_sale(&receipt.sale_id, "manager1")
            .await
            .unwrap();

        // Stock comes back; the closed drawer's reconciled totals do not
        // change retroactively.
        assert_eq!(cancel.restocked_units, 2);
        assert_eq!(cancel.reversed_cents, 0);

        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_on_hand, 10);
        let closed = db.drawers().get(&drawer.id).await.unwrap();
        assert_eq!(closed.cash_total_cents, 4_000);
    }

    #[tokio::test]
    async fn test_last_unit_race_has_one_winner() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Last", 1, 1_000).await;
        db.drawers().open("op1", 0).await.unwrap();
        db.drawers().open("op2", 0).await.unwrap();

        let checkout = db.checkout();
        let lines = [line(&product_id, 1)];
        let payments = [cash(1_000)];
        let (a, b) = tokio::join!(
            checkout.create_sale("op1", None, &lines, &payments),
            checkout.create_sale("op2", None, &lines, &payments),
        );

        let wins = [a.is_ok(), b.is_ok()].iter().filter(|&&w| w).count();
        assert_eq!(wins, 1);

        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_on_hand, 0);
        // Exactly one kardex entry: the loser left no trace
        assert_eq!(db.ledger().kardex(&product_id, 10).await.unwrap().len(), 1);
    }
}
