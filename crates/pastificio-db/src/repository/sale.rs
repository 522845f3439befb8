//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. INSERT (after stock was consumed by the engine)                    │
//! │     └── insert() → header + items in ONE transaction                  │
//! │         state = 'completed', items frozen from here on                 │
//! │                                                                         │
//! │  2. (OPTIONAL) VOID                                                    │
//! │     └── void_with_restock() → ONE transaction:                         │
//! │         UPDATE sales ... WHERE state = 'completed'                     │
//! │         UPDATE products ... stock_quantity + Σ item quantity          │
//! │         Loser of a concurrent void sees 0 rows and restores nothing.   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales are never deleted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use pastificio_core::{PaymentMethod, Sale, SaleItem, SaleState, UnitOfMeasure};

const SALE_COLUMNS: &str = r#"
    id,
    created_at,
    total_cents,
    payment_method,
    cash_session_id,
    state,
    notes,
    created_by,
    voided_at
"#;

/// Shared with the closing transaction in the cash session repository.
pub(crate) const CASH_TOTAL_SQL: &str = r#"
    SELECT COALESCE(SUM(s.total_cents), 0)
    FROM sales s
    JOIN cash_sessions c ON c.id = s.cash_session_id
    WHERE s.cash_session_id = ?1
      AND s.payment_method = 'cash'
      AND s.state = 'completed'
      AND s.created_at >= c.opened_at
"#;

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    created_at: DateTime<Utc>,
    total_cents: i64,
    payment_method: PaymentMethod,
    cash_session_id: Option<String>,
    state: SaleState,
    notes: Option<String>,
    created_by: String,
    voided_at: Option<DateTime<Utc>>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> Sale {
        Sale {
            id: self.id,
            created_at: self.created_at,
            items,
            total_cents: self.total_cents,
            payment_method: self.payment_method,
            cash_session_id: self.cash_session_id,
            state: self.state,
            notes: self.notes,
            created_by: self.created_by,
            voided_at: self.voided_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    sale_id: String,
    product_id: String,
    description: String,
    unit_of_measure: UnitOfMeasure,
    quantity: f64,
    unit_price_cents: i64,
    line_total_cents: i64,
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            product_id: row.product_id,
            description: row.description,
            unit_of_measure: row.unit_of_measure,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            line_total_cents: row.line_total_cents,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Persists a sale header and all its items in one transaction.
    ///
    /// `cash_session_id` is not taken from `sale`: the header insert picks
    /// the session open at that instant and the field is updated from it.
    /// The insert is the first statement of the transaction, so the write
    /// lock is held from there and a concurrent close either commits before
    /// (no session) or after (this sale is in its totals).
    ///
    /// ## Returns
    /// * `Ok(())` - Both header and items are stored
    /// * `Err(_)` - Nothing is stored
    pub async fn insert(&self, sale: &mut Sale) -> DbResult<()> {
        debug!(id = %sale.id, items = sale.items.len(), "Inserting sale");

        let mut tx = self.pool.begin().await?;

        let session_id: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO sales (
                id, created_at, total_cents, payment_method, cash_session_id,
                state, notes, created_by, voided_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                (SELECT id FROM cash_sessions WHERE state = 'open'),
                ?5, ?6, ?7, ?8
            )
            RETURNING cash_session_id
            "#,
        )
        .bind(&sale.id)
        .bind(sale.created_at)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.state)
        .bind(&sale.notes)
        .bind(&sale.created_by)
        .bind(sale.voided_at)
        .fetch_one(&mut *tx)
        .await?;

        for (line_no, item) in sale.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    sale_id, line_no, product_id, description, unit_of_measure,
                    quantity, unit_price_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&sale.id)
            .bind(line_no as i64)
            .bind(&item.product_id)
            .bind(&item.description)
            .bind(item.unit_of_measure)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sale.cash_session_id = session_id;
        Ok(())
    }

    /// Gets a sale with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);

        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Most recent sales first, any state.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales ORDER BY created_at DESC, id LIMIT ?1",
            SALE_COLUMNS
        );

        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        self.attach_items(rows).await
    }

    /// Sales with `from <= created_at <= to` in one of `states`,
    /// most recent first.
    pub async fn list_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        states: &[SaleState],
    ) -> DbResult<Vec<Sale>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM sales WHERE created_at >= ", SALE_COLUMNS));
        builder.push_bind(from);
        builder.push(" AND created_at <= ");
        builder.push_bind(to);
        builder.push(" AND state IN (");
        let mut separated = builder.separated(", ");
        for state in states {
            separated.push_bind(*state);
        }
        separated.push_unseparated(")");
        builder.push(" ORDER BY created_at DESC, id");

        let rows: Vec<SaleRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        self.attach_items(rows).await
    }

    /// Sales attributed to a cash session, in chronological order.
    pub async fn list_by_cash_session(&self, session_id: &str) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales WHERE cash_session_id = ?1 ORDER BY created_at, id",
            SALE_COLUMNS
        );

        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        self.attach_items(rows).await
    }

    /// Completed sales with no cash session in `[from, to]`.
    pub async fn list_unattributed(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Sale>> {
        let sql = format!(
            r#"
            SELECT {} FROM sales
            WHERE cash_session_id IS NULL
              AND state = 'completed'
              AND created_at >= ?1
              AND created_at <= ?2
            ORDER BY created_at, id
            "#,
            SALE_COLUMNS
        );

        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        self.attach_items(rows).await
    }

    /// Unattributed cash sales reported by the closing of `session_id`,
    /// in chronological order.
    pub async fn list_reported_in(&self, session_id: &str) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales WHERE reported_in_session_id = ?1 ORDER BY created_at, id",
            SALE_COLUMNS
        );

        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        self.attach_items(rows).await
    }

    /// Σ totals of completed cash sales attributed to a session and stamped
    /// at or after its opening.
    pub async fn cash_total_for_session(&self, session_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(CASH_TOTAL_SQL)
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    /// Voids a completed sale and restores its stock atomically.
    ///
    /// ## Returns
    /// * `Ok(true)` - This call voided the sale and restored stock
    /// * `Ok(false)` - The sale was not `completed`; nothing written
    pub async fn void_with_restock(&self, sale_id: &str, voided_at: DateTime<Utc>) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET state = 'voided', voided_at = ?2
            WHERE id = ?1 AND state = 'completed'
            "#,
        )
        .bind(sale_id)
        .bind(voided_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let restocked = sqlx::query(
            r#"
            UPDATE products
            SET
                stock_quantity = stock_quantity + (
                    SELECT SUM(si.quantity)
                    FROM sale_items si
                    WHERE si.sale_id = ?1 AND si.product_id = products.id
                ),
                updated_at = ?2
            WHERE id IN (SELECT product_id FROM sale_items WHERE sale_id = ?1)
            "#,
        )
        .bind(sale_id)
        .bind(voided_at)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            sale_id = %sale_id,
            products = restocked.rows_affected(),
            "Sale voided and stock restored"
        );
        Ok(true)
    }

    /// Loads the items of `rows` in one query and assembles sales,
    /// keeping the order of `rows`.
    async fn attach_items(&self, rows: Vec<SaleRow>) -> DbResult<Vec<Sale>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT sale_id, product_id, description, unit_of_measure,
                   quantity, unit_price_cents, line_total_cents
            FROM sale_items
            WHERE sale_id IN ("#,
        );
        let mut separated = builder.separated(", ");
        for row in &rows {
            separated.push_bind(row.id.clone());
        }
        separated.push_unseparated(")");
        builder.push(" ORDER BY sale_id, line_no");

        let item_rows: Vec<SaleItemRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut items_by_sale: HashMap<String, Vec<SaleItem>> = HashMap::new();
        for item in item_rows {
            items_by_sale
                .entry(item.sale_id.clone())
                .or_default()
                .push(item.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = items_by_sale.remove(&row.id).unwrap_or_default();
                row.into_sale(items)
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
    use crate::repository::fixtures::product;
    use chrono::Duration;

    fn sale(id: &str, method: PaymentMethod, total: i64) -> Sale {
        Sale {
            id: id.to_string(),
            created_at: Utc::now(),
            items: vec![SaleItem {
                product_id: "p".to_string(),
                description: "Fusilli".to_string(),
                unit_of_measure: UnitOfMeasure::Unit,
                quantity: 2.0,
                unit_price_cents: total / 2,
                line_total_cents: total,
            }],
            total_cents: total,
            payment_method: method,
            cash_session_id: None,
            state: SaleState::Completed,
            notes: None,
            created_by: "u-1".to_string(),
            voided_at: None,
        }
    }

    async fn db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .upsert(&product("p", UnitOfMeasure::Unit, 500, 8.0))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_insert_and_get_with_items() {
        let db = db().await;
        let repo = db.sales();
        repo.insert(&mut sale("s-1", PaymentMethod::Cash, 1000)).await.unwrap();

        let loaded = repo.get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].description, "Fusilli");
        assert_eq!(loaded.state, SaleState::Completed);
        assert_eq!(loaded.payment_method, PaymentMethod::Cash);
        assert!(repo.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_void_with_restock_runs_once() {
        let db = db().await;
        let repo = db.sales();
        repo.insert(&mut sale("s-1", PaymentMethod::Cash, 1000)).await.unwrap();

        assert!(repo.void_with_restock("s-1", Utc::now()).await.unwrap());
        assert!(!repo.void_with_restock("s-1", Utc::now()).await.unwrap());

        assert_eq!(db.products().stock_of("p").await.unwrap(), Some(10.0));
        let loaded = repo.get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.state, SaleState::Voided);
        assert!(loaded.voided_at.is_some());
    }

    #[tokio::test]
    async fn test_date_range_state_filter() {
        let db = db().await;
        let repo = db.sales();
        repo.insert(&mut sale("s-1", PaymentMethod::Cash, 1000)).await.unwrap();
        repo.insert(&mut sale("s-2", PaymentMethod::BankTransfer, 400)).await.unwrap();
        repo.void_with_restock("s-2", Utc::now()).await.unwrap();

        let from = Utc::now() - Duration::hours(1);
        let to = Utc::now() + Duration::hours(1);

        let all = repo
            .list_by_date_range(from, to, &SaleState::REPORTING_DEFAULT)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let voided = repo
            .list_by_date_range(from, to, &[SaleState::Voided])
            .await
            .unwrap();
        assert_eq!(voided.len(), 1);
        assert_eq!(voided[0].id, "s-2");
    }

    async fn open_session(db: &Database, id: &str) {
        sqlx::query(
            "INSERT INTO cash_sessions (id, opened_at, opening_amount_cents, state, owner_user_id)
             VALUES (?1, ?2, 0, 'open', 'u-1')",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_insert_resolves_open_session() {
        let db = db().await;
        let repo = db.sales();

        let mut loose = sale("s-1", PaymentMethod::Cash, 1000);
        loose.cash_session_id = Some("stale".to_string());
        repo.insert(&mut loose).await.unwrap();
        assert_eq!(loose.cash_session_id, None);

        open_session(&db, "c-1").await;
        let mut attributed = sale("s-2", PaymentMethod::BankTransfer, 300);
        repo.insert(&mut attributed).await.unwrap();
        assert_eq!(attributed.cash_session_id.as_deref(), Some("c-1"));

        let stored = repo.get_by_id("s-2").await.unwrap().unwrap();
        assert_eq!(stored.cash_session_id.as_deref(), Some("c-1"));
    }

    #[tokio::test]
    async fn test_unattributed_and_session_total() {
        let db = db().await;
        let repo = db.sales();
        repo.insert(&mut sale("s-3", PaymentMethod::Cash, 700)).await.unwrap();

        open_session(&db, "c-1").await;
        repo.insert(&mut sale("s-1", PaymentMethod::Cash, 1000)).await.unwrap();
        repo.insert(&mut sale("s-2", PaymentMethod::DigitalWallet, 500)).await.unwrap();

        assert_eq!(repo.cash_total_for_session("c-1").await.unwrap(), 1000);

        let loose = repo
            .list_unattributed(Utc::now() - Duration::hours(1), Utc::now())
            .await
            .unwrap();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].id, "s-3");

        assert_eq!(repo.list_by_cash_session("c-1").await.unwrap().len(), 2);
    }
}
