//! # Reporting Reader
//!
//! Read-only aggregation over drawers, sales and movements. Never writes;
//! shift reports and audits go through here so the transactional services
//! stay the only mutation paths.

use sqlx::SqlitePool;

use caja_core::{CashDrawer, CoreError, Sale};

use crate::service::ServiceResult;

/// SELECT column list shared with the drawer manager's reads.
const DRAWER_COLUMNS: &str = "id, operator_id, business_day, state, opened_at, closed_at, \
     initial_cents, cash_total_cents, card_total_cents, qr_total_cents, \
     counted_cash_cents, counted_card_cents, counted_qr_cents, difference_cents, notes";

const SALE_COLUMNS: &str = "id, drawer_id, operator_id, status, subtotal_cents, tax_cents, \
     total_cents, paid_cents, change_cents, created_at, cancelled_at, cancelled_by";

/// Shift report for one drawer: the drawer row plus payment and movement
/// breakdowns recomputed from the underlying rows.
///
/// `cash/card/qr_sales_cents` cover payments of sales still Completed;
/// cancelled sales drop out of the breakdown the same way their reversal
/// dropped them out of the running totals.
#[derive(Debug, Clone)]
pub struct DrawerSummary {
    pub drawer: CashDrawer,
    pub sales_count: i64,
    pub cash_sales_cents: i64,
    pub card_sales_cents: i64,
    pub qr_sales_cents: i64,
    pub manual_in_cents: i64,
    pub manual_out_cents: i64,
}

/// Read-only reporting service.
#[derive(Debug, Clone)]
pub struct ReportReader {
    pool: SqlitePool,
}

impl ReportReader {
    /// Creates a new ReportReader.
    pub fn new(pool: SqlitePool) -> Self {
        ReportReader { pool }
    }

    /// Builds a shift report for a drawer.
    ///
    /// The breakdowns are recomputed from sale/payment/movement rows, so
    /// comparing them against the drawer's running totals doubles as a
    /// consistency audit.
    pub async fn drawer_summary(&self, drawer_id: &str) -> ServiceResult<DrawerSummary> {
        let drawer = sqlx::query_as::<_, CashDrawer>(&format!(
            "SELECT {DRAWER_COLUMNS} FROM cash_drawers WHERE id = ?1"
        ))
        .bind(drawer_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::DrawerNotFound(drawer_id.to_string()))?;

        let sales_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sales WHERE drawer_id = ?1 AND status = 'completed'",
        )
        .bind(drawer_id)
        .fetch_one(&self.pool)
        .await?;

        // Payments grouped into the same buckets the drawer accumulates
        let (cash_sales_cents, card_sales_cents, qr_sales_cents): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN p.method = 'cash' THEN p.amount_cents END), 0),
                    COALESCE(SUM(CASE WHEN p.method = 'card' THEN p.amount_cents END), 0),
                    COALESCE(SUM(CASE WHEN p.method IN ('wallet_a', 'wallet_b')
                                      THEN p.amount_cents END), 0)
                FROM payments p
                JOIN sales s ON s.id = p.sale_id
                WHERE s.drawer_id = ?1 AND s.status = 'completed'
                "#,
            )
            .bind(drawer_id)
            .fetch_one(&self.pool)
            .await?;

        let (manual_in_cents, manual_out_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'ingreso' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN kind = 'egreso' THEN amount_cents END), 0)
            FROM cash_movements
            WHERE drawer_id = ?1
            "#,
        )
        .bind(drawer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(DrawerSummary {
            drawer,
            sales_count,
            cash_sales_cents,
            card_sales_cents,
            qr_sales_cents,
            manual_in_cents,
            manual_out_cents,
        })
    }

    /// Sales attributed to a drawer, oldest first, cancelled included.
    pub async fn sales_for_drawer(&self, drawer_id: &str) -> ServiceResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE drawer_id = ?1 ORDER BY created_at, rowid"
        ))
        .bind(drawer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Completed sales for an operator on a business day, across drawers.
    pub async fn sales_for_operator_day(
        &self,
        operator_id: &str,
        business_day: &str,
    ) -> ServiceResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE operator_id = ?1
              AND status = 'completed'
              AND drawer_id IN (
                  SELECT id FROM cash_drawers WHERE business_day = ?2
              )
            ORDER BY created_at, rowid
            "#
        ))
        .bind(operator_id)
        .bind(business_day)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
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
    use caja_core::{LineRequest, MovementKind, PaymentMethod, PaymentRequest, SaleStatus};

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

    fn pay(method: PaymentMethod, amount_cents: i64) -> PaymentRequest {
        PaymentRequest {
            method,
            amount_cents,
            reference: None,
        }
    }

    #[tokio::test]
    async fn test_drawer_summary_matches_running_totals() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 20, 1_000).await;
        let drawer = db.drawers().open("op1", 5_000).await.unwrap();

        db.checkout()
            .create_sale(
                "op1",
                None,
                &[line(&product_id, 2)],
                &[pay(PaymentMethod::Cash, 2_000)],
            )
            .await
            .unwrap();
        db.checkout()
            .create_sale(
                "op1",
                None,
                &[line(&product_id, 3)],
                &[pay(PaymentMethod::Card, 3_000)],
            )
            .await
            .unwrap();
        db.drawers()
            .add_movement(&drawer.id, MovementKind::Ingreso, 1_500, "float", "op1")
            .await
            .unwrap();
        db.drawers()
            .add_movement(&drawer.id, MovementKind::Egreso, 500, "supplier", "op1")
            .await
            .unwrap();

        let summary = db.reports().drawer_summary(&drawer.id).await.unwrap();

        assert_eq!(summary.sales_count, 2);
        assert_eq!(summary.cash_sales_cents, 2_000);
        assert_eq!(summary.card_sales_cents, 3_000);
        assert_eq!(summary.qr_sales_cents, 0);
        assert_eq!(summary.manual_in_cents, 1_500);
        assert_eq!(summary.manual_out_cents, 500);

        // Breakdown agrees with the drawer's own running totals
        assert_eq!(
            summary.drawer.cash_total_cents,
            summary.cash_sales_cents + summary.manual_in_cents - summary.manual_out_cents
        );
        assert_eq!(summary.drawer.card_total_cents, summary.card_sales_cents);
    }

    #[tokio::test]
    async fn test_cancelled_sales_drop_out_of_summary() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 20, 1_000).await;
        let drawer = db.drawers().open("op1", 0).await.unwrap();

        let receipt = db
            .checkout()
            .create_sale(
                "op1",
                None,
                &[line(&product_id, 1)],
                &[pay(PaymentMethod::Cash, 1_000)],
            )
            .await
            .unwrap();
        db.checkout()
            .cancel_sale(&receipt.sale_id, "op1")
            .await
            .unwrap();

        let summary = db.reports().drawer_summary(&drawer.id).await.unwrap();
        assert_eq!(summary.sales_count, 0);
        assert_eq!(summary.cash_sales_cents, 0);
        assert_eq!(summary.drawer.cash_total_cents, 0);

        // But the cancelled sale still shows in the full listing
        let sales = db.reports().sales_for_drawer(&drawer.id).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].status, SaleStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_sales_for_operator_day() {
        let db = test_db().await;
        let product_id = seed_product(&db, "Widget", 20, 1_000).await;
        let drawer = db.drawers().open("op1", 0).await.unwrap();

        db.checkout()
            .create_sale(
                "op1",
                None,
                &[line(&product_id, 1)],
                &[pay(PaymentMethod::Cash, 1_000)],
            )
            .await
            .unwrap();
        let cancelled = db
            .checkout()
            .create_sale(
                "op1",
                None,
                &[line(&product_id, 1)],
                &[pay(PaymentMethod::Cash, 1_000)],
            )
            .await
            .unwrap();
        db.checkout()
            .cancel_sale(&cancelled.sale_id, "op1")
            .await
            .unwrap();

        // Only the operator's still-completed sales for that day
        let sales = db
            .reports()
            .sales_for_operator_day("op1", &drawer.business_day)
            .await
            .unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].status, SaleStatus::Completed);

        assert!(db
            .reports()
            .sales_for_operator_day("op1", "1999-01-01")
            .await
            .unwrap()
            .is_empty());
        assert!(db
            .reports()
            .sales_for_operator_day("op2", &drawer.business_day)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_summary_unknown_drawer() {
        let db = test_db().await;
        let err = db.reports().drawer_summary("ghost").await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::DrawerNotFound(_))
        ));
    }
}
