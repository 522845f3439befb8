//! # Order Repository
//!
//! Database operations for customer orders.
//!
//! Every state write is conditional on what the caller read:
//! - `update_state`: `WHERE id = ? AND state = <previously read state>`
//! - `link_sale`: `WHERE id = ? AND linked_sale_id IS NULL AND state <> 'cancelled'`,
//!   setting `linked_sale_id` and `state = 'delivered'` in the same row update.
//!
//! The table CHECK `state <> 'delivered' OR linked_sale_id IS NOT NULL`
//! backs the delivered-implies-linked rule at the store level.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use pastificio_core::{Order, OrderItem, OrderState};

const ORDER_COLUMNS: &str = r#"
    id,
    created_at,
    updated_at,
    client,
    notes,
    state,
    linked_sale_id,
    created_by
"#;

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    client: Option<String>,
    notes: Option<String>,
    state: OrderState,
    linked_sale_id: Option<String>,
    created_by: String,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            client: self.client,
            notes: self.notes,
            items,
            state: self.state,
            linked_sale_id: self.linked_sale_id,
            created_by: self.created_by,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: String,
    quantity: f64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Persists an order header and its items in one transaction.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, items = order.items.len(), "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, created_at, updated_at, client, notes, state,
                linked_sale_id, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(&order.client)
        .bind(&order.notes)
        .bind(order.state)
        .bind(&order.linked_sale_id)
        .bind(&order.created_by)
        .execute(&mut *tx)
        .await?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, quantity)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&order.id)
            .bind(line_no as i64)
            .bind(&item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Gets an order with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Most recent orders first, optionally in one state.
    pub async fn list(&self, state: Option<OrderState>, limit: u32) -> DbResult<Vec<Order>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
        if let Some(state) = state {
            builder.push(" WHERE state = ");
            builder.push_bind(state);
        }
        builder.push(" ORDER BY created_at DESC, id LIMIT ");
        builder.push_bind(limit);

        let rows: Vec<OrderRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        self.attach_items(rows).await
    }

    /// Moves an order from `expected` to `new_state`.
    ///
    /// ## Returns
    /// * `Ok(true)` - Written
    /// * `Ok(false)` - The stored state was no longer `expected`
    pub async fn update_state(
        &self,
        id: &str,
        expected: OrderState,
        new_state: OrderState,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = ?3, updated_at = ?4
            WHERE id = ?1 AND state = ?2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_state)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(
            id = %id,
            from = %expected,
            to = %new_state,
            written = result.rows_affected() == 1,
            "Order state update"
        );
        Ok(result.rows_affected() == 1)
    }

    /// Links a sale and forces `Delivered` in one row update.
    ///
    /// ## Returns
    /// * `Ok(true)` - This call linked the sale
    /// * `Ok(false)` - Already linked or cancelled meanwhile; nothing written
    pub async fn link_sale(&self, id: &str, sale_id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET linked_sale_id = ?2, state = 'delivered', updated_at = ?3
            WHERE id = ?1
              AND linked_sale_id IS NULL
              AND state <> 'cancelled'
            "#,
        )
        .bind(id)
        .bind(sale_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT order_id, product_id, quantity FROM order_items WHERE order_id IN (",
        );
        let mut separated = builder.separated(", ");
        for row in &rows {
            separated.push_bind(row.id.clone());
        }
        separated.push_unseparated(")");
        builder.push(" ORDER BY order_id, line_no");

        let item_rows: Vec<OrderItemRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut items_by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for item in item_rows {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use pastificio_core::{PaymentMethod, Sale, SaleState};

    fn order(id: &str) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            client: Some("Trattoria Da Mario".to_string()),
            notes: None,
            items: vec![
                OrderItem {
                    product_id: "tagliatelle".to_string(),
                    quantity: 1.5,
                },
                OrderItem {
                    product_id: "ravioli".to_string(),
                    quantity: 2.0,
                },
            ],
            state: OrderState::Pending,
            linked_sale_id: None,
            created_by: "u-1".to_string(),
        }
    }

    async fn insert_sale(db: &Database, id: &str) {
        db.sales()
            .insert(&mut Sale {
                id: id.to_string(),
                created_at: Utc::now(),
                items: vec![],
                total_cents: 0,
                payment_method: PaymentMethod::Cash,
                cash_session_id: None,
                state: SaleState::Completed,
                notes: None,
                created_by: "u-1".to_string(),
                voided_at: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insert_get_keeps_line_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();
        repo.insert(&order("o-1")).await.unwrap();

        let loaded = repo.get_by_id("o-1").await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.items[0].product_id, "tagliatelle");
        assert_eq!(loaded.state, OrderState::Pending);

        assert_eq!(repo.list(Some(OrderState::Pending), 10).await.unwrap().len(), 1);
        assert!(repo.list(Some(OrderState::Cancelled), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_state_is_conditional() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();
        repo.insert(&order("o-1")).await.unwrap();

        let now = Utc::now();
        assert!(repo
            .update_state("o-1", OrderState::Pending, OrderState::Confirmed, now)
            .await
            .unwrap());
        assert!(!repo
            .update_state("o-1", OrderState::Pending, OrderState::Cancelled, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delivered_without_sale_rejected_by_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();
        repo.insert(&order("o-1")).await.unwrap();

        let err = repo
            .update_state("o-1", OrderState::Pending, OrderState::Delivered, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_link_sale_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();
        repo.insert(&order("o-1")).await.unwrap();
        insert_sale(&db, "s-1").await;
        insert_sale(&db, "s-2").await;

        assert!(repo.link_sale("o-1", "s-1", Utc::now()).await.unwrap());
        assert!(!repo.link_sale("o-1", "s-2", Utc::now()).await.unwrap());

        let loaded = repo.get_by_id("o-1").await.unwrap().unwrap();
        assert_eq!(loaded.state, OrderState::Delivered);
        assert_eq!(loaded.linked_sale_id.as_deref(), Some("s-1"));
    }
}
