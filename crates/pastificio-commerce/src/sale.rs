//! # Sale Engine
//!
//! Records sales against stock, cancels them, and answers sale queries.
//!
//! ## Sale Creation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_sale(request)                             │
//! │                                                                         │
//! │  1. merge lines ──► EmptyItems / InvalidQuantity                       │
//! │  2. batch catalog lookup ──► UnknownProduct / ProductInactive /        │
//! │                              InvalidQuantity (Unit, Box)               │
//! │  3. for each line: StockLedger::try_consume                            │
//! │        │                                                                │
//! │        └─ failure on line k ──► restore lines 1..k-1 ──► error          │
//! │  4. snapshot prices, total = round(Σ q × price)                        │
//! │  5. insert header + items (one transaction); the open session, if      │
//! │     any, is resolved inside that write, for any payment method         │
//! │        │                                                                │
//! │        └─ failure ──► restore every line ──► error                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Session attribution is part of the insert, so a sale can never reference a
//! session that was already closed when the sale was stored.
//!
//! Cancellation voids the sale and restores its stock in a single database
//! transaction; the conditional state update makes a second cancel a no-op.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use pastificio_core::quantity::{ensure_valid_for, normalize_for};
use pastificio_core::validation::{merge_lines, optional_text, require_user_id, MAX_NOTES_LEN};
use pastificio_core::{
    new_id, Caller, CashSession, CoreError, LineRequest, Money, PaymentMethod, Sale, SaleItem,
    SaleState, ValidationError,
};
use pastificio_db::SaleRepository;

use crate::catalog::Catalog;
use crate::error::CommerceResult;
use crate::stock::StockLedger;

/// Input of [`SaleEngine::create_sale`].
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSaleRequest {
    pub items: Vec<LineRequest>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SaleEngine {
    sales: SaleRepository,
    catalog: Catalog,
    stock: StockLedger,
    max_lines: usize,
}

impl SaleEngine {
    pub fn new(
        sales: SaleRepository,
        catalog: Catalog,
        stock: StockLedger,
        max_lines: usize,
    ) -> Self {
        SaleEngine {
            sales,
            catalog,
            stock,
            max_lines,
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Records a sale, consuming stock for every line or for none.
    pub async fn create_sale(
        &self,
        request: CreateSaleRequest,
        caller: &Caller,
    ) -> CommerceResult<Sale> {
        require_user_id(&caller.user_id)?;
        let mut lines = merge_lines(&request.items, self.max_lines)?;
        let notes = optional_text("notes", request.notes, MAX_NOTES_LEN)?;

        let ids: Vec<String> = lines.iter().map(|line| line.product_id.clone()).collect();
        let products = self.catalog.get_products(&ids).await?;
        for line in &mut lines {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| CoreError::UnknownProduct(line.product_id.clone()))?;
            if !product.active {
                return Err(CoreError::ProductInactive(product.id.clone()).into());
            }
            ensure_valid_for(&product.id, product.unit_of_measure, line.quantity)?;
            line.quantity = normalize_for(product.unit_of_measure, line.quantity);
        }

        let mut consumed: Vec<(String, f64)> = Vec::with_capacity(lines.len());
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let consumption = match self.stock.try_consume(&line.product_id, line.quantity).await {
                Ok(consumption) => consumption,
                Err(err) => {
                    self.compensate(&consumed, "line rejected").await;
                    return Err(err);
                }
            };
            consumed.push((line.product_id.clone(), line.quantity));

            // Lookup above guarantees presence; the price comes from the CAS.
            if let Some(product) = products.get(&line.product_id) {
                items.push(SaleItem {
                    product_id: product.id.clone(),
                    description: product.description.clone(),
                    unit_of_measure: product.unit_of_measure,
                    quantity: line.quantity,
                    unit_price_cents: consumption.unit_price.cents(),
                    line_total_cents: consumption.unit_price.times_quantity(line.quantity).cents(),
                });
            }
        }

        let total = Money::total_of(
            items
                .iter()
                .map(|item| (item.quantity, item.unit_price())),
        );

        let mut sale = Sale {
            id: new_id(),
            created_at: Utc::now(),
            items,
            total_cents: total.cents(),
            payment_method: request.payment_method,
            cash_session_id: None,
            state: SaleState::Completed,
            notes,
            created_by: caller.user_id.clone(),
            voided_at: None,
        };

        if let Err(err) = self.sales.insert(&mut sale).await {
            error!(sale_id = %sale.id, error = %err, "Failed to persist sale");
            self.compensate(&consumed, "persist failed").await;
            return Err(err.into());
        }

        info!(
            sale_id = %sale.id,
            total = %total,
            lines = sale.items.len(),
            payment_method = %sale.payment_method,
            cash_session_id = ?sale.cash_session_id,
            created_by = %sale.created_by,
            "Sale recorded"
        );

        Ok(sale)
    }

    /// Puts back every quantity consumed so far. Failures are logged and
    /// the remaining lines are still attempted.
    async fn compensate(&self, consumed: &[(String, f64)], reason: &str) {
        if consumed.is_empty() {
            return;
        }

        warn!(lines = consumed.len(), reason, "Compensating consumed stock");
        for (product_id, quantity) in consumed {
            if let Err(err) = self.stock.try_restore(product_id, *quantity).await {
                error!(
                    product_id = %product_id,
                    quantity = *quantity,
                    error = %err,
                    "Failed to restore stock during compensation"
                );
            }
        }
    }

    /// Voids a completed sale and restores its stock.
    ///
    /// Cancelling an already voided sale returns it unchanged.
    pub async fn cancel_sale(&self, sale_id: &str, caller: &Caller) -> CommerceResult<Sale> {
        require_user_id(&caller.user_id)?;

        let sale = self.get_by_id(sale_id).await?;
        if !sale.check_cancellable()? {
            debug!(sale_id = %sale_id, "Sale already voided");
            return Ok(sale);
        }

        if self.sales.void_with_restock(sale_id, Utc::now()).await? {
            info!(
                sale_id = %sale_id,
                total = %sale.total(),
                voided_by = %caller.user_id,
                "Sale voided, stock restored"
            );
        } else {
            debug!(sale_id = %sale_id, "Sale was voided concurrently");
        }

        let current = self.get_by_id(sale_id).await?;
        match current.check_cancellable()? {
            false => Ok(current),
            true => Err(CoreError::ConcurrentModification {
                entity: "Sale".to_string(),
                id: sale_id.to_string(),
            }
            .into()),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_by_id(&self, sale_id: &str) -> CommerceResult<Sale> {
        self.sales
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }

    /// Most recent sales first.
    pub async fn list_recent(&self, limit: u32) -> CommerceResult<Vec<Sale>> {
        Ok(self.sales.list_recent(limit).await?)
    }

    /// Sales with `from <= created_at <= to`. The state filter defaults to
    /// completed and voided.
    pub async fn list_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        states: Option<&[SaleState]>,
    ) -> CommerceResult<Vec<Sale>> {
        ensure_range(from, to)?;
        let states = states.unwrap_or(&SaleState::REPORTING_DEFAULT[..]);
        Ok(self.sales.list_by_date_range(from, to, states).await?)
    }

    pub async fn list_by_cash_session(&self, session_id: &str) -> CommerceResult<Vec<Sale>> {
        Ok(self.sales.list_by_cash_session(session_id).await?)
    }

    /// Completed sales recorded without an open session.
    pub async fn list_unattributed(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CommerceResult<Vec<Sale>> {
        ensure_range(from, to)?;
        Ok(self.sales.list_unattributed(from, to).await?)
    }

    /// Cash sales without a session reported by the closing of `session_id`.
    pub async fn list_reported_in(&self, session_id: &str) -> CommerceResult<Vec<Sale>> {
        Ok(self.sales.list_reported_in(session_id).await?)
    }

    /// Σ totals of completed cash sales attributed to `session`.
    pub async fn cash_sales_total(&self, session: &CashSession) -> CommerceResult<Money> {
        let cents = self.sales.cash_total_for_session(&session.id).await?;
        Ok(Money::from_cents(cents))
    }
}

fn ensure_range(from: DateTime<Utc>, to: DateTime<Utc>) -> CommerceResult<()> {
    if from > to {
        return Err(ValidationError::InvalidFormat {
            field: "from".to_string(),
            reason: "must not be after 'to'".to_string(),
        }
        .into());
    }
    Ok(())
}
