//! # Order Engine
//!
//! Customer orders: creation, the state machine, and conversion into a sale.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   [Pending] ──confirm──► [Confirmed] ──generate sale──► [Delivered]    │
//! │      │  ▲                    │                          (terminal)      │
//! │      │  │ reopen             │                                          │
//! │      ▼  │                    ▼                                          │
//! │   [Cancelled] ◄──────────────┘                                          │
//! │                                                                         │
//! │   Delivered always carries linked_sale_id. Linking and the move to     │
//! │   Delivered are one conditional row update.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conversion Race
//! Two concurrent conversions may both create a sale; only one wins the
//! link. The loser cancels its own sale (stock restored) and reports
//! `AlreadyConverted`, so an order yields exactly one completed sale.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use pastificio_core::quantity::{ensure_valid_for, normalize_for};
use pastificio_core::validation::{
    merge_lines, optional_text, require_user_id, MAX_CLIENT_LEN, MAX_NOTES_LEN,
};
use pastificio_core::{
    new_id, Caller, CoreError, LineRequest, Money, Order, OrderItem, OrderState, PaymentMethod,
    Sale, Transition, UnitOfMeasure,
};
use pastificio_db::OrderRepository;

use crate::catalog::Catalog;
use crate::error::CommerceResult;
use crate::sale::{CreateSaleRequest, SaleEngine};

/// Input of [`OrderEngine::create_order`].
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateOrderRequest {
    pub items: Vec<LineRequest>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An order line priced from the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedOrderLine {
    pub product_id: String,
    pub quantity: f64,
    pub description: Option<String>,
    pub unit_of_measure: Option<UnitOfMeasure>,
    pub unit_price: Option<Money>,
    pub line_total: Option<Money>,
    /// The product is gone from the catalog or no longer sold.
    pub unavailable: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedOrder {
    pub order: Order,
    pub lines: Vec<PricedOrderLine>,
    /// round(Σ q × price) over available lines.
    pub estimated_total: Money,
}

#[derive(Debug, Clone)]
pub struct OrderEngine {
    orders: OrderRepository,
    catalog: Catalog,
    sales: SaleEngine,
    max_lines: usize,
}

impl OrderEngine {
    pub fn new(
        orders: OrderRepository,
        catalog: Catalog,
        sales: SaleEngine,
        max_lines: usize,
    ) -> Self {
        OrderEngine {
            orders,
            catalog,
            sales,
            max_lines,
        }
    }

    /// Records a new `Pending` order. Stock is not touched.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        caller: &Caller,
    ) -> CommerceResult<Order> {
        require_user_id(&caller.user_id)?;
        let mut lines = merge_lines(&request.items, self.max_lines)?;
        let client = optional_text("client", request.client, MAX_CLIENT_LEN)?;
        let notes = optional_text("notes", request.notes, MAX_NOTES_LEN)?;

        let ids: Vec<String> = lines.iter().map(|line| line.product_id.clone()).collect();
        let products = self.catalog.get_products(&ids).await?;
        for line in &mut lines {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| CoreError::UnknownProduct(line.product_id.clone()))?;
            ensure_valid_for(&product.id, product.unit_of_measure, line.quantity)?;
            line.quantity = normalize_for(product.unit_of_measure, line.quantity);
        }

        let now = Utc::now();
        let order = Order {
            id: new_id(),
            created_at: now,
            updated_at: now,
            client,
            notes,
            items: lines
                .into_iter()
                .map(|line| OrderItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .collect(),
            state: OrderState::Pending,
            linked_sale_id: None,
            created_by: caller.user_id.clone(),
        };

        self.orders.insert(&order).await?;

        info!(
            order_id = %order.id,
            lines = order.items.len(),
            client = ?order.client,
            created_by = %order.created_by,
            "Order created"
        );
        Ok(order)
    }

    /// Moves an order to `new_state`.
    ///
    /// The write is conditional on the state read first; losing that race
    /// yields `ConcurrentModification`. No-op transitions write nothing.
    pub async fn set_state(&self, order_id: &str, new_state: OrderState) -> CommerceResult<Order> {
        let order = self.get_by_id(order_id).await?;

        match order.check_transition(new_state)? {
            Transition::NoOp => {
                debug!(order_id = %order_id, state = %order.state, "Order state unchanged");
                return Ok(order);
            }
            Transition::Change => {}
        }

        let written = self
            .orders
            .update_state(order_id, order.state, new_state, Utc::now())
            .await?;
        if !written {
            return Err(CoreError::ConcurrentModification {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }
            .into());
        }

        info!(order_id = %order_id, from = %order.state, to = %new_state, "Order state changed");
        self.get_by_id(order_id).await
    }

    /// Turns an order into a sale and marks it delivered.
    pub async fn generate_sale_from_order(
        &self,
        order_id: &str,
        payment_method: PaymentMethod,
        caller: &Caller,
    ) -> CommerceResult<(Sale, Order)> {
        let order = self.get_by_id(order_id).await?;
        order.check_convertible()?;

        let request = CreateSaleRequest {
            items: order.to_line_requests(),
            payment_method,
            notes: Some(format!("Order {}", order.id)),
        };
        let sale = self.sales.create_sale(request, caller).await?;

        if !self.orders.link_sale(order_id, &sale.id, Utc::now()).await? {
            return Err(self.undo_conversion(order_id, &sale, caller).await);
        }

        info!(
            order_id = %order_id,
            sale_id = %sale.id,
            total = %sale.total(),
            "Order converted into sale"
        );

        let order = self.get_by_id(order_id).await?;
        Ok((sale, order))
    }

    /// Cancels a sale whose order was converted or cancelled meanwhile, and
    /// explains why.
    async fn undo_conversion(
        &self,
        order_id: &str,
        sale: &Sale,
        caller: &Caller,
    ) -> crate::CommerceError {
        warn!(
            order_id = %order_id,
            sale_id = %sale.id,
            "Order changed during conversion, cancelling the new sale"
        );

        if let Err(err) = self.sales.cancel_sale(&sale.id, caller).await {
            error!(sale_id = %sale.id, error = %err, "Failed to cancel orphaned order sale");
        }

        match self.get_by_id(order_id).await {
            Ok(current) => match (current.linked_sale_id, current.state) {
                (Some(sale_id), _) => CoreError::AlreadyConverted {
                    order_id: order_id.to_string(),
                    sale_id,
                }
                .into(),
                (None, OrderState::Cancelled) => CoreError::OrderCancelled(order_id.to_string()).into(),
                (None, _) => CoreError::ConcurrentModification {
                    entity: "Order".to_string(),
                    id: order_id.to_string(),
                }
                .into(),
            },
            Err(err) => err,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_by_id(&self, order_id: &str) -> CommerceResult<Order> {
        self.orders
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }

    /// Most recent orders first, optionally in one state.
    pub async fn list(&self, state: Option<OrderState>, limit: u32) -> CommerceResult<Vec<Order>> {
        Ok(self.orders.list(state, limit).await?)
    }

    /// The order with every line priced from the current catalog.
    pub async fn priced(&self, order_id: &str) -> CommerceResult<PricedOrder> {
        let order = self.get_by_id(order_id).await?;

        let ids: Vec<String> = order.items.iter().map(|item| item.product_id.clone()).collect();
        let products = self.catalog.get_products(&ids).await?;

        let lines: Vec<PricedOrderLine> = order
            .items
            .iter()
            .map(|item| match products.get(&item.product_id) {
                Some(product) if product.active => PricedOrderLine {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    description: Some(product.description.clone()),
                    unit_of_measure: Some(product.unit_of_measure),
                    unit_price: Some(product.unit_price()),
                    line_total: Some(product.unit_price().times_quantity(item.quantity)),
                    unavailable: false,
                },
                found => PricedOrderLine {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    description: found.map(|product| product.description.clone()),
                    unit_of_measure: found.map(|product| product.unit_of_measure),
                    unit_price: None,
                    line_total: None,
                    unavailable: true,
                },
            })
            .collect();

        let estimated_total = Money::total_of(
            lines
                .iter()
                .filter_map(|line| line.unit_price.map(|price| (line.quantity, price))),
        );

        Ok(PricedOrder {
            order,
            lines,
            estimated_total,
        })
    }
}
