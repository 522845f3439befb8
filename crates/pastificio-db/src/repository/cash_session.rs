//! # Cash Session Repository
//!
//! Database operations for cash-drawer sessions.
//!
//! ## Single Open Session
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CREATE UNIQUE INDEX idx_cash_sessions_single_open                     │
//! │      ON cash_sessions(state) WHERE state = 'open';                     │
//! │                                                                         │
//! │  open #1 ──► INSERT state='open' ──► ok                                │
//! │  open #2 ──► INSERT state='open' ──► UNIQUE constraint failed          │
//! │                                       (mapped to AlreadyOpen upstream) │
//! │                                                                         │
//! │  close ──► ONE transaction, write first:                               │
//! │            UPDATE ... SET state = 'closed' WHERE id = ? AND open       │
//! │            mark cash sales no session can count                        │
//! │            SELECT Σ cash sales of the session                          │
//! │            UPDATE ... SET calculated = opening + Σ                     │
//! │            the loser of two concurrent closes matches 0 rows           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales resolve their session inside their own insert, and the close holds
//! the write lock from its first statement, so every sale attributed to a
//! session is counted in that session's calculated amount.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::sale::CASH_TOTAL_SQL;
use pastificio_core::CashSession;

const SESSION_COLUMNS: &str = r#"
    id,
    opened_at,
    closed_at,
    opening_amount_cents,
    calculated_closing_amount_cents,
    real_closing_amount_cents,
    state,
    owner_user_id,
    closed_by,
    notes
"#;

/// Values written when a session is closed.
#[derive(Debug, Clone)]
pub struct SessionClose<'a> {
    pub closed_at: DateTime<Utc>,
    pub real_closing_amount_cents: i64,
    pub closed_by: &'a str,
    pub notes: Option<&'a str>,
}

/// A session closed by [`CashSessionRepository::close`].
#[derive(Debug, Clone)]
pub struct ClosedSession {
    pub session: CashSession,
    /// Σ completed cash sales counted into the calculated amount.
    pub cash_sales_cents: i64,
}

/// Repository for cash session database operations.
#[derive(Debug, Clone)]
pub struct CashSessionRepository {
    pool: SqlitePool,
}

impl CashSessionRepository {
    /// Creates a new CashSessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashSessionRepository { pool }
    }

    /// Inserts a freshly opened session.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - another session is already open
    pub async fn insert_open(&self, session: &CashSession) -> DbResult<()> {
        debug!(id = %session.id, owner = %session.owner_user_id, "Inserting cash session");

        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, opened_at, opening_amount_cents, state, owner_user_id, notes
            ) VALUES (?1, ?2, ?3, 'open', ?4, ?5)
            "#,
        )
        .bind(&session.id)
        .bind(session.opened_at)
        .bind(session.opening_amount_cents)
        .bind(&session.owner_user_id)
        .bind(&session.notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The open session, if any. Always a fresh query.
    pub async fn find_open(&self) -> DbResult<Option<CashSession>> {
        let sql = format!(
            "SELECT {} FROM cash_sessions WHERE state = 'open' LIMIT 1",
            SESSION_COLUMNS
        );

        let session = sqlx::query_as::<_, CashSession>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Gets a session by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!("SELECT {} FROM cash_sessions WHERE id = ?1", SESSION_COLUMNS);

        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Most recently opened sessions first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<CashSession>> {
        let sql = format!(
            "SELECT {} FROM cash_sessions ORDER BY opened_at DESC, id LIMIT ?1",
            SESSION_COLUMNS
        );

        let sessions = sqlx::query_as::<_, CashSession>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }

    /// Closes an open session and reconciles it against its cash sales.
    ///
    /// Completed cash sales the reconciliation cannot count are marked as
    /// reported by this closing: those stored without any session and not
    /// reported before, and this session's own sales stamped before it
    /// opened.
    ///
    /// The state change comes first so the transaction holds the write lock
    /// before summing; no sale can be attributed to the session between the
    /// sum and the commit.
    ///
    /// ## Returns
    /// * `Ok(Some(closed))` - This call closed it
    /// * `Ok(None)` - The session was not open anymore; nothing written
    pub async fn close(&self, id: &str, close: SessionClose<'_>) -> DbResult<Option<ClosedSession>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET
                state = 'closed',
                closed_at = ?2,
                real_closing_amount_cents = ?3,
                closed_by = ?4,
                notes = COALESCE(?5, notes)
            WHERE id = ?1 AND state = 'open'
            "#,
        )
        .bind(id)
        .bind(close.closed_at)
        .bind(close.real_closing_amount_cents)
        .bind(close.closed_by)
        .bind(close.notes)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let reported = sqlx::query(
            r#"
            UPDATE sales
            SET reported_in_session_id = ?1
            WHERE payment_method = 'cash'
              AND state = 'completed'
              AND reported_in_session_id IS NULL
              AND (
                  cash_session_id IS NULL
                  OR (
                      cash_session_id = ?1
                      AND created_at < (SELECT opened_at FROM cash_sessions WHERE id = ?1)
                  )
              )
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let cash_sales_cents: i64 = sqlx::query_scalar(CASH_TOTAL_SQL)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let sql = format!(
            r#"
            UPDATE cash_sessions
            SET calculated_closing_amount_cents = opening_amount_cents + ?2
            WHERE id = ?1
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(id)
            .bind(cash_sales_cents)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            id = %id,
            cash_sales_cents,
            unattributed = reported.rows_affected(),
            "Cash session closed"
        );
        Ok(Some(ClosedSession {
            session,
            cash_sales_cents,
        }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
