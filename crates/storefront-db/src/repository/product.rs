//! # Product Repository
//!
//! Catalogue reads and inventory levels.
//!
//! ## Inventory Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Touches stock_quantity                           │
//! │                                                                         │
//! │  PricingPipeline ──► get_by_id()         read only, may be stale       │
//! │                                                                         │
//! │  OrderRepository ──► create_paid_order() conditional decrement         │
//! │                      WHERE stock_quantity >= requested                  │
//! │                                                                         │
//! │  Back office     ──► set_stock()         absolute restock              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::Product;

const PRODUCT_COLUMNS: &str = "id, name, description, category, price_cents, stock_quantity, \
                               in_stock, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID, active or not.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found (deleted or never existed)
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
            PRODUCT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category, price_cents,
                stock_quantity, in_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.in_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Sets the absolute stock level (restock / stocktake).
    ///
    /// `in_stock` follows the quantity.
    pub async fn set_stock(&self, id: &str, quantity: i64) -> DbResult<()> {
        if quantity < 0 {
            return Err(DbError::QueryFailed(format!(
                "stock for {} cannot be negative ({})",
                id, quantity
            )));
        }

        debug!(id = %id, quantity = quantity, "Setting stock level");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = ?2, in_stock = (?2 > 0), updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Soft-deletes a product. Paid orders keep their snapshots.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use storefront_core::ProductCategory;
    use uuid::Uuid;

    fn test_product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            name: "Canvas Sneaker".to_string(),
            description: None,
            category: ProductCategory::Footwear,
            price_cents: 6500,
            stock_quantity: stock,
            in_stock: stock > 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = test_product(4);
        db.products().insert(&product).await.unwrap();

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Canvas Sneaker");
        assert_eq!(loaded.category, ProductCategory::Footwear);
        assert_eq!(loaded.stock_quantity, 4);
        assert!(loaded.in_stock);

        assert!(db.products().get_by_id("missing").await.unwrap().is_none());
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_stock_tracks_in_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = test_product(2);
        db.products().insert(&product).await.unwrap();

        db.products().set_stock(&product.id, 0).await.unwrap();
        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 0);
        assert!(!loaded.in_stock);

        assert!(db.products().set_stock(&product.id, -1).await.is_err());
        assert!(matches!(
            db.products().set_stock("missing", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = test_product(2);
        db.products().insert(&product).await.unwrap();

        db.products().deactivate(&product.id).await.unwrap();
        assert!(db.products().list_active(10).await.unwrap().is_empty());
    }
}
