//! # Product Repository
//!
//! Catalog reads and the stock compare-and-swap.
//!
//! ## Key Operations
//! - Single and batch product lookups
//! - `try_consume`: conditional stock decrement (CAS)
//! - `restore`: unconditional stock increment
//!
//! ## Stock Compare-and-Swap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Why One Statement                                    │
//! │                                                                         │
//! │  ❌ WRONG: read-then-write                                             │
//! │     SELECT stock_quantity → 5                                          │
//! │     (another sale consumes 4 here)                                     │
//! │     UPDATE ... SET stock_quantity = 5 - 3     ← lost update            │
//! │                                                                         │
//! │  ✅ CORRECT: conditional update                                        │
//! │     UPDATE products                                                    │
//! │        SET stock_quantity = stock_quantity - 3                         │
//! │      WHERE id = ? AND active = 1                                       │
//! │        AND stock_quantity >= 3                                         │
//! │     RETURNING unit_price_cents, stock_quantity                         │
//! │                                                                         │
//! │  0 rows → nothing changed; a diagnostic read explains why.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The comparison is exact: the amount removed is the amount requested, so a
//! later restore of the same amount puts stock back where it was.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use pastificio_core::Product;

const PRODUCT_COLUMNS: &str = r#"
    id,
    description,
    category,
    unit_price_cents,
    unit_of_measure,
    stock_quantity,
    active,
    created_at,
    updated_at
"#;

/// Result of a successful conditional decrement.
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct ConsumedStock {
    /// Price at the instant of consumption.
    pub unit_price_cents: i64,
    /// Stock left after the decrement.
    pub stock_quantity: f64,
}

/// Why a conditional decrement matched no row.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeRejection {
    Missing,
    Inactive,
    Insufficient { available: f64 },
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let products = repo.get_many(&["FUS-500".to_string()]).await?;
/// match repo.try_consume("FUS-500", 3.0).await? {
///     Ok(consumed) => { /* stock decremented */ }
///     Err(rejection) => { /* nothing changed */ }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Fetches many products in one query, keyed by id.
    ///
    /// Ids missing from the catalog are simply absent from the map.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<HashMap<String, Product>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        debug!(count = ids.len(), "Batch product lookup");

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM products WHERE id IN (", PRODUCT_COLUMNS));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let products: Vec<Product> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    /// Lists products, active first, by description.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products ORDER BY active DESC, description LIMIT ?1",
            PRODUCT_COLUMNS
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Inserts or replaces a catalog entry.
    ///
    /// Catalog maintenance is owned elsewhere; this exists for seeding and
    /// tests.
    pub async fn upsert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Upserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, description, category, unit_price_cents, unit_of_measure,
                stock_quantity, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                description = excluded.description,
                category = excluded.category,
                unit_price_cents = excluded.unit_price_cents,
                unit_of_measure = excluded.unit_of_measure,
                stock_quantity = excluded.stock_quantity,
                active = excluded.active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.unit_price_cents)
        .bind(product.unit_of_measure)
        .bind(product.stock_quantity)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts catalog entries (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Current stock of a product, if it exists.
    pub async fn stock_of(&self, id: &str) -> DbResult<Option<f64>> {
        let stock: Option<f64> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(stock)
    }

    /// Conditionally decrements stock.
    ///
    /// The outer `Result` is infrastructure; the inner one tells whether the
    /// decrement happened. On `Err(rejection)` nothing was written.
    pub async fn try_consume(
        &self,
        id: &str,
        quantity: f64,
    ) -> DbResult<Result<ConsumedStock, ConsumeRejection>> {
        let now = Utc::now();

        let consumed = sqlx::query_as::<_, ConsumedStock>(
            r#"
            UPDATE products
            SET
                stock_quantity = stock_quantity - ?2,
                updated_at = ?3
            WHERE id = ?1
              AND active = 1
              AND stock_quantity >= ?2
            RETURNING unit_price_cents, stock_quantity
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(consumed) = consumed {
            debug!(
                id = %id,
                quantity = quantity,
                remaining = consumed.stock_quantity,
                "Stock consumed"
            );
            return Ok(Ok(consumed));
        }

        // Diagnostic only; never feeds a write.
        let row: Option<(f64, bool)> =
            sqlx::query_as("SELECT stock_quantity, active FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let rejection = match row {
            None => ConsumeRejection::Missing,
            Some((_, false)) => ConsumeRejection::Inactive,
            Some((available, true)) => ConsumeRejection::Insufficient { available },
        };

        debug!(id = %id, quantity = quantity, ?rejection, "Stock consumption rejected");
        Ok(Err(rejection))
    }

    /// Unconditionally increments stock.
    ///
    /// ## Returns
    /// * `Ok(new_stock)` - Product exists, stock incremented
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn restore(&self, id: &str, quantity: f64) -> DbResult<f64> {
        let now = Utc::now();

        let stock: Option<f64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET
                stock_quantity = stock_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match stock {
            Some(stock) => {
                debug!(id = %id, quantity = quantity, stock = stock, "Stock restored");
                Ok(stock)
            }
            None => Err(DbError::not_found("Product", id)),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::fixtures::product;
    use pastificio_core::UnitOfMeasure;

    async fn repo() -> ProductRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = repo().await;
        repo.upsert(&product("p-1", UnitOfMeasure::Weight, 1240, 5.5))
            .await
            .unwrap();

        let found = repo.get_many(&["p-1".to_string()]).await.unwrap();
        let found = &found["p-1"];
        assert_eq!(found.unit_price_cents, 1240);
        assert_eq!(found.unit_of_measure, UnitOfMeasure::Weight);
        assert!(found.active);
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let repo = repo().await;
        repo.upsert(&product("a", UnitOfMeasure::Unit, 100, 1.0)).await.unwrap();
        repo.upsert(&product("b", UnitOfMeasure::Box, 200, 1.0)).await.unwrap();

        let ids = vec!["a".to_string(), "b".to_string(), "zzz".to_string()];
        let found = repo.get_many(&ids).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found["b"].unit_price_cents, 200);
        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_try_consume_is_all_or_nothing() {
        let repo = repo().await;
        repo.upsert(&product("p", UnitOfMeasure::Unit, 500, 10.0)).await.unwrap();

        let consumed = repo.try_consume("p", 3.0).await.unwrap().unwrap();
        assert_eq!(consumed.unit_price_cents, 500);
        assert_eq!(consumed.stock_quantity, 7.0);

        let rejected = repo.try_consume("p", 8.0).await.unwrap();
        assert_eq!(rejected, Err(ConsumeRejection::Insufficient { available: 7.0 }));
        assert_eq!(repo.stock_of("p").await.unwrap(), Some(7.0));

        let consumed = repo.try_consume("p", 7.0).await.unwrap().unwrap();
        assert_eq!(consumed.stock_quantity, 0.0);
    }

    #[tokio::test]
    async fn test_try_consume_never_takes_more_than_stock() {
        let repo = repo().await;
        repo.upsert(&product("w", UnitOfMeasure::Weight, 999, 1.0)).await.unwrap();

        let rejected = repo.try_consume("w", 1.0000009).await.unwrap();
        assert_eq!(rejected, Err(ConsumeRejection::Insufficient { available: 1.0 }));
        assert_eq!(repo.stock_of("w").await.unwrap(), Some(1.0));

        let consumed = repo.try_consume("w", 0.25).await.unwrap().unwrap();
        assert_eq!(consumed.stock_quantity, 0.75);
        assert_eq!(repo.restore("w", 0.25).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_try_consume_rejections() {
        let repo = repo().await;
        let mut inactive = product("off", UnitOfMeasure::Unit, 100, 10.0);
        inactive.active = false;
        repo.upsert(&inactive).await.unwrap();

        assert_eq!(
            repo.try_consume("off", 1.0).await.unwrap(),
            Err(ConsumeRejection::Inactive)
        );
        assert_eq!(
            repo.try_consume("ghost", 1.0).await.unwrap(),
            Err(ConsumeRejection::Missing)
        );
        assert_eq!(repo.stock_of("off").await.unwrap(), Some(10.0));
    }

    #[tokio::test]
    async fn test_restore() {
        let repo = repo().await;
        repo.upsert(&product("p", UnitOfMeasure::Unit, 100, 2.0)).await.unwrap();

        assert_eq!(repo.restore("p", 3.0).await.unwrap(), 5.0);
        assert!(matches!(
            repo.restore("ghost", 1.0).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
