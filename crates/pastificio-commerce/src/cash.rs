//! # Cash Session Manager
//!
//! Opens and closes the cash drawer and reconciles it against cash sales.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open(amount) ──► [Open] ──── close(counted) ────► [Closed]           │
//! │        │                            │                                   │
//! │        │ another Open exists        │ calculated = opening + Σ cash     │
//! │        ▼                            │ discrepancy = counted − calc      │
//! │   AlreadyOpen                       ▼                                   │
//! │                          CashClosing + unattributed cash sales (WARN)   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one session is open at a time; the store's partial unique index
//! decides concurrent opens. Closing sums the session's cash sales and flips
//! `state = 'open'` in one write transaction, so a second close finds no
//! open session and a sale stored during a close lands on one side of it.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use ts_rs::TS;

use pastificio_core::validation::{
    non_negative_amount, optional_text, require_user_id, MAX_NOTES_LEN,
};
use pastificio_core::{new_id, Caller, CashSession, CashSessionState, CoreError, Money, Sale};
use pastificio_db::{CashSessionRepository, SessionClose};

use crate::error::CommerceResult;
use crate::sale::SaleEngine;

/// Result of closing the drawer.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashClosing {
    pub session: CashSession,
    pub cash_sales_total: Money,
    /// real − calculated. Recorded, never rejected.
    pub discrepancy: Money,
    /// Cash sales this closing could not count: recorded while no session
    /// was open, or stamped before this session opened.
    pub unattributed_cash_sales: Vec<Sale>,
}

/// The open session with its running expected drawer amount.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashSessionSummary {
    pub session: CashSession,
    pub cash_sales_total: Money,
    /// opening amount + cash sales so far.
    pub expected_amount: Money,
}

#[derive(Debug, Clone)]
pub struct CashSessionManager {
    sessions: CashSessionRepository,
    sales: SaleEngine,
}

impl CashSessionManager {
    pub fn new(sessions: CashSessionRepository, sales: SaleEngine) -> Self {
        CashSessionManager { sessions, sales }
    }

    /// Opens the drawer with a counted float.
    pub async fn open(
        &self,
        caller: &Caller,
        opening_amount: Money,
        notes: Option<String>,
    ) -> CommerceResult<CashSession> {
        require_user_id(&caller.user_id)?;
        non_negative_amount("openingAmountCents", opening_amount.cents())?;
        let notes = optional_text("notes", notes, MAX_NOTES_LEN)?;

        let session = CashSession {
            id: new_id(),
            opened_at: Utc::now(),
            closed_at: None,
            opening_amount_cents: opening_amount.cents(),
            calculated_closing_amount_cents: None,
            real_closing_amount_cents: None,
            state: CashSessionState::Open,
            owner_user_id: caller.user_id.clone(),
            closed_by: None,
            notes,
        };

        match self.sessions.insert_open(&session).await {
            Ok(()) => {}
            Err(err) if err.is_unique_violation() => {
                return Err(self.already_open().await?.into());
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            session_id = %session.id,
            opening_amount = %opening_amount,
            owner = %session.owner_user_id,
            "Cash session opened"
        );
        Ok(session)
    }

    /// Describes the session that blocked an open.
    async fn already_open(&self) -> CommerceResult<CoreError> {
        match self.sessions.find_open().await? {
            Some(open) => {
                debug!(session_id = %open.id, "Open rejected, session already open");
                Ok(CoreError::AlreadyOpen { session_id: open.id })
            }
            // The blocking session closed between the insert and this read.
            None => Ok(CoreError::ConcurrentModification {
                entity: "CashSession".to_string(),
                id: "open".to_string(),
            }),
        }
    }

    /// Closes the open session against the counted drawer amount.
    pub async fn close(
        &self,
        caller: &Caller,
        real_closing_amount: Money,
        notes: Option<String>,
    ) -> CommerceResult<CashClosing> {
        require_user_id(&caller.user_id)?;
        non_negative_amount("realClosingAmountCents", real_closing_amount.cents())?;
        let notes = optional_text("notes", notes, MAX_NOTES_LEN)?;

        let open = self
            .sessions
            .find_open()
            .await?
            .ok_or(CoreError::NoOpenSession)?;

        let closed_at = Utc::now();
        let closed = self
            .sessions
            .close(
                &open.id,
                SessionClose {
                    closed_at,
                    real_closing_amount_cents: real_closing_amount.cents(),
                    closed_by: &caller.user_id,
                    notes: notes.as_deref(),
                },
            )
            .await?
            .ok_or(CoreError::NoOpenSession)?;

        let session = closed.session;
        let cash_sales_total = Money::from_cents(closed.cash_sales_cents);
        let calculated = session.opening_amount() + cash_sales_total;

        let unattributed_cash_sales = self.sales.list_reported_in(&session.id).await?;
        if !unattributed_cash_sales.is_empty() {
            let amount = unattributed_cash_sales
                .iter()
                .fold(Money::zero(), |acc, sale| acc + sale.total());
            warn!(
                session_id = %session.id,
                count = unattributed_cash_sales.len(),
                amount = %amount,
                "Cash sales outside any session, excluded from reconciliation"
            );
        }

        let discrepancy = real_closing_amount - calculated;
        if !discrepancy.is_zero() {
            warn!(
                session_id = %session.id,
                calculated = %calculated,
                counted = %real_closing_amount,
                discrepancy = %discrepancy,
                "Cash drawer discrepancy"
            );
        }

        info!(
            session_id = %session.id,
            cash_sales_total = %cash_sales_total,
            calculated = %calculated,
            closed_by = %caller.user_id,
            "Cash session closed"
        );

        Ok(CashClosing {
            session,
            cash_sales_total,
            discrepancy,
            unattributed_cash_sales,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The open session, if any.
    pub async fn current(&self) -> CommerceResult<Option<CashSession>> {
        Ok(self.sessions.find_open().await?)
    }

    pub async fn current_summary(&self) -> CommerceResult<Option<CashSessionSummary>> {
        let Some(session) = self.current().await? else {
            return Ok(None);
        };

        let cash_sales_total = self.sales.cash_sales_total(&session).await?;
        Ok(Some(CashSessionSummary {
            expected_amount: session.opening_amount() + cash_sales_total,
            cash_sales_total,
            session,
        }))
    }

    pub async fn get_by_id(&self, session_id: &str) -> CommerceResult<CashSession> {
        self.sessions
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()).into())
    }

    /// Most recent sessions first.
    pub async fn list(&self, limit: u32) -> CommerceResult<Vec<CashSession>> {
        Ok(self.sessions.list(limit).await?)
    }

    /// Sales attributed to a session, oldest first.
    pub async fn sales_of(&self, session_id: &str) -> CommerceResult<Vec<Sale>> {
        let session = self.get_by_id(session_id).await?;
        self.sales.list_by_cash_session(&session.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{back_office, caller, sale_request, seed, shared_back_office};
    use crate::CommerceError;
    use pastificio_core::{PaymentMethod, UnitOfMeasure};

    #[tokio::test]
    async fn test_open_close_reconciles_cash_sales() {
        let office = back_office().await;
        seed(&office, "A", UnitOfMeasure::Unit, 500, 10.0).await;
        seed(&office, "B", UnitOfMeasure::Unit, 250, 10.0).await;
        let cash = office.cash();

        let session = cash
            .open(&caller(), Money::from_cents(5000), Some("morning".into()))
            .await
            .unwrap();
        assert!(session.is_open());

        let sales = office.sales();
        sales
            .create_sale(sale_request(&[("A", 2.0)], PaymentMethod::Cash), &caller())
            .await
            .unwrap();
        sales
            .create_sale(sale_request(&[("A", 1.0)], PaymentMethod::Cash), &caller())
            .await
            .unwrap();
        sales
            .create_sale(sale_request(&[("B", 1.0)], PaymentMethod::Cash), &caller())
            .await
            .unwrap();
        sales
            .create_sale(sale_request(&[("B", 4.0)], PaymentMethod::DigitalWallet), &caller())
            .await
            .unwrap();

        let summary = cash.current_summary().await.unwrap().unwrap();
        assert_eq!(summary.cash_sales_total, Money::from_cents(1750));
        assert_eq!(summary.expected_amount, Money::from_cents(6750));

        let closing = cash
            .close(&caller(), Money::from_cents(6700), None)
            .await
            .unwrap();
        assert_eq!(closing.cash_sales_total, Money::from_cents(1750));
        assert_eq!(closing.session.calculated_closing_amount_cents, Some(6750));
        assert_eq!(closing.session.real_closing_amount_cents, Some(6700));
        assert_eq!(closing.discrepancy, Money::from_cents(-50));
        assert_eq!(closing.session.state, CashSessionState::Closed);
        assert_eq!(closing.session.closed_by.as_deref(), Some("u-1"));
        assert_eq!(closing.session.notes.as_deref(), Some("morning"));
        assert!(closing.unattributed_cash_sales.is_empty());

        assert!(cash.current().await.unwrap().is_none());
        assert_eq!(cash.sales_of(&session.id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_voided_sales_do_not_count() {
        let office = back_office().await;
        seed(&office, "A", UnitOfMeasure::Unit, 1000, 10.0).await;
        let cash = office.cash();
        cash.open(&caller(), Money::from_cents(5000), None).await.unwrap();

        let sale = office
            .sales()
            .create_sale(sale_request(&[("A", 1.0)], PaymentMethod::Cash), &caller())
            .await
            .unwrap();
        office.sales().cancel_sale(&sale.id, &caller()).await.unwrap();

        let closing = cash.close(&caller(), Money::from_cents(5000), None).await.unwrap();
        assert_eq!(closing.cash_sales_total, Money::zero());
        assert_eq!(closing.discrepancy, Money::zero());
    }

    #[tokio::test]
    async fn test_second_open_is_rejected() {
        let office = back_office().await;
        let cash = office.cash();
        let first = cash.open(&caller(), Money::from_cents(1000), None).await.unwrap();

        let err = cash
            .open(&caller(), Money::from_cents(2000), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Core(CoreError::AlreadyOpen { ref session_id }) if *session_id == first.id
        ));
        assert_eq!(cash.list(10).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_create_one_session() {
        let (office, _dir) = shared_back_office().await;
        let cash = office.cash();

        let attempts: Vec<_> = (0..6)
            .map(|_| {
                let cash = cash.clone();
                tokio::spawn(async move { cash.open(&caller(), Money::from_cents(1000), None).await })
            })
            .collect();
        let mut opened = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => opened += 1,
                Err(CommerceError::Core(CoreError::AlreadyOpen { .. })) => {}
                Err(CommerceError::Core(CoreError::ConcurrentModification { .. })) => {}
                Err(other) => panic!("unexpected open failure: {other}"),
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(cash.list(10).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sales_racing_a_close_are_all_accounted_for() {
        let (office, _dir) = shared_back_office().await;
        seed(&office, "A", UnitOfMeasure::Unit, 100, 100.0).await;
        let cash = office.cash();
        let session = cash.open(&caller(), Money::zero(), None).await.unwrap();

        let sales: Vec<_> = (0..30)
            .map(|_| {
                let engine = office.sales().clone();
                tokio::spawn(async move {
                    engine
                        .create_sale(sale_request(&[("A", 1.0)], PaymentMethod::Cash), &caller())
                        .await
                })
            })
            .collect();
        let closing = cash.close(&caller(), Money::zero(), None).await.unwrap();
        for sale in sales {
            sale.await.unwrap().unwrap();
        }

        // Everything attributed to the session is in its calculated amount.
        let attributed = cash.sales_of(&session.id).await.unwrap();
        let attributed_total = attributed
            .iter()
            .fold(Money::zero(), |acc, sale| acc + sale.total());
        assert_eq!(closing.cash_sales_total, attributed_total);
        assert_eq!(
            closing.session.calculated_closing_amount_cents,
            Some(attributed_total.cents())
        );

        // The rest was stored after the close, without a session, and is
        // reported by the next closing.
        let late = 30 - attributed.len();
        cash.open(&caller(), Money::zero(), None).await.unwrap();
        let next = cash.close(&caller(), Money::zero(), None).await.unwrap();
        assert_eq!(next.unattributed_cash_sales.len(), late);
        assert!(next
            .unattributed_cash_sales
            .iter()
            .all(|sale| sale.cash_session_id.is_none()));
        assert_eq!(office.stock().available("A").await.unwrap(), 70.0);
    }

    #[tokio::test]
    async fn test_close_without_open_session() {
        let office = back_office().await;
        let cash = office.cash();

        assert!(matches!(
            cash.close(&caller(), Money::zero(), None).await,
            Err(CommerceError::Core(CoreError::NoOpenSession))
        ));

        cash.open(&caller(), Money::zero(), None).await.unwrap();
        cash.close(&caller(), Money::zero(), None).await.unwrap();
        assert!(matches!(
            cash.close(&caller(), Money::zero(), None).await,
            Err(CommerceError::Core(CoreError::NoOpenSession))
        ));
    }

    #[tokio::test]
    async fn test_negative_amounts_rejected() {
        let office = back_office().await;
        let cash = office.cash();

        assert!(matches!(
            cash.open(&caller(), Money::from_cents(-1), None).await,
            Err(CommerceError::Core(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_unattributed_cash_sales_reported() {
        let office = back_office().await;
        seed(&office, "A", UnitOfMeasure::Unit, 300, 10.0).await;
        let cash = office.cash();

        let orphan = office
            .sales()
            .create_sale(sale_request(&[("A", 1.0)], PaymentMethod::Cash), &caller())
            .await
            .unwrap();
        office
            .sales()
            .create_sale(sale_request(&[("A", 1.0)], PaymentMethod::BankTransfer), &caller())
            .await
            .unwrap();

        cash.open(&caller(), Money::from_cents(1000), None).await.unwrap();
        let closing = cash.close(&caller(), Money::from_cents(1000), None).await.unwrap();

        assert_eq!(closing.cash_sales_total, Money::zero());
        assert_eq!(closing.unattributed_cash_sales.len(), 1);
        assert_eq!(closing.unattributed_cash_sales[0].id, orphan.id);

        // Already reported by the previous closing.
        cash.open(&caller(), Money::from_cents(1000), None).await.unwrap();
        let closing = cash.close(&caller(), Money::from_cents(1000), None).await.unwrap();
        assert!(closing.unattributed_cash_sales.is_empty());
    }

    #[tokio::test]
    async fn test_session_not_found() {
        let office = back_office().await;
        assert!(matches!(
            office.cash().get_by_id("missing").await,
            Err(CommerceError::Core(CoreError::SessionNotFound(_)))
        ));
        assert!(matches!(
            office.cash().sales_of("missing").await,
            Err(CommerceError::Core(CoreError::SessionNotFound(_)))
        ));
    }
}
