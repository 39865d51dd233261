//! # Product Repository
//!
//! Catalog row access: create and read products.
//!
//! Deliberately absent: any method that writes `stock_on_hand`. Current
//! stock changes only through the inventory ledger's `apply_movement`,
//! which appends the matching kardex entry in the same transaction. A
//! second write path here is how the original system accumulated silent
//! stock drift.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use caja_core::Product;

/// SELECT column list shared by every product query.
const PRODUCT_COLUMNS: &str = "id, name, stock_on_hand, cost_cents, price_cents, \
     stock_min, stock_max, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

/// Catalog fields for creating a product; stock and timestamps are set by
/// the repository.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub initial_stock: i64,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub stock_min: i64,
    pub stock_max: i64,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product and returns it.
    ///
    /// `initial_stock` is the opening balance of the kardex replay
    /// invariant: from here on, `stock_on_hand` equals this value plus
    /// the sum of the product's signed kardex deltas.
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            stock_on_hand: new.initial_stock,
            cost_cents: new.cost_cents,
            price_cents: new.price_cents,
            stock_min: new.stock_min,
            stock_max: new.stock_max,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, stock_on_hand, cost_cents, price_cents,
                stock_min, stock_max, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.stock_on_hand)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.stock_min)
        .bind(product.stock_max)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical sales and kardex entries still reference the row, so it
    /// is never physically deleted.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn widget(stock: i64) -> NewProduct {
        NewProduct {
            name: "Widget".to_string(),
            initial_stock: stock,
            cost_cents: 1000,
            price_cents: 2500,
            stock_min: 2,
            stock_max: 50,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let repo = db.products();

        let product = repo.insert(widget(10)).await.unwrap();
        let fetched = repo.get_by_id(&product.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "Widget");
        assert_eq!(fetched.stock_on_hand, 10);
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let db = test_db().await;
        let found = db.products().get_by_id("no-such-id").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let db = test_db().await;
        let repo = db.products();

        let product = repo.insert(widget(5)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.soft_delete(&product.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);

        // Row still exists for historical references
        assert!(repo.get_by_id(&product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_active() {
        let db = test_db().await;
        let repo = db.products();

        repo.insert(widget(1)).await.unwrap();
        repo.insert(NewProduct {
            name: "Gadget".to_string(),
            initial_stock: 3,
            cost_cents: 500,
            price_cents: 900,
            stock_min: 1,
            stock_max: 20,
        })
        .await
        .unwrap();

        let products = repo.list_active(10).await.unwrap();
        assert_eq!(products.len(), 2);
        // Sorted by name
        assert_eq!(products[0].name, "Gadget");
    }
}
