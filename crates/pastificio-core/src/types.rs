//! # Domain Types
//!
//! Core domain types of the commerce core.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  CashSession    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  unit_price     │◄──│  items (frozen) │──►│  opening_amount │       │
//! │  │  unit_of_measure│   │  cash_session_id│   │  calculated /   │       │
//! │  │  stock_quantity │   │  state          │   │  real closing   │       │
//! │  └─────────────────┘   └────────▲────────┘   └─────────────────┘       │
//! │                                 │ linked_sale_id                        │
//! │                        ┌────────┴────────┐                              │
//! │                        │     Order       │                              │
//! │                        │  items (no      │                              │
//! │                        │  price snapshot)│                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `cash_session_id` and `linked_sale_id` are weak references: they are
//! checked when written and only ever used for lookups.
//!
//! ## State Machines
//! ```text
//! Sale:        Completed ──cancel──► Voided        (Returned: not driven here)
//! CashSession: Open ──close──► Closed              (Paused: reserved)
//! Order:       Pending ──► Confirmed ──► Delivered (only with a linked sale)
//!                 │  ▲          │
//!                 ▼  │reopen    ▼
//!               Cancelled ◄─────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Caller
// =============================================================================

/// Identity of the caller, supplied by the identity collaborator.
///
/// Opaque to this core: recorded in `created_by` / `owner_user_id`, never
/// authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Caller {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

// =============================================================================
// Unit of Measure
// =============================================================================

/// How a product is measured and sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum UnitOfMeasure {
    /// Kilograms (fresh pasta by weight).
    Weight,
    /// Single pieces.
    Unit,
    /// Liters (sauces, broths).
    Volume,
    /// Boxes / trays.
    Box,
}

impl UnitOfMeasure {
    /// Unit and Box products are only sold in whole quantities.
    pub fn requires_integral_quantity(&self) -> bool {
        match self {
            UnitOfMeasure::Unit | UnitOfMeasure::Box => true,
            UnitOfMeasure::Weight | UnitOfMeasure::Volume => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfMeasure::Weight => "weight",
            UnitOfMeasure::Unit => "unit",
            UnitOfMeasure::Volume => "volume",
            UnitOfMeasure::Box => "box",
        }
    }
}

impl fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog entry, as read by the commerce core.
///
/// The catalog collaborator owns every field except `stock_quantity`, which
/// is only written through the stock ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub description: String,
    pub category: String,
    /// Current list price in cents.
    pub unit_price_cents: i64,
    pub unit_of_measure: UnitOfMeasure,
    /// Never negative.
    pub stock_quantity: f64,
    /// Inactive products cannot be sold.
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    /// Physical cash, goes into the drawer.
    Cash,
    /// Wallet apps / QR payments.
    DigitalWallet,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::DigitalWallet => "digital_wallet",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale State
// =============================================================================

/// The state of a recorded sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SaleState {
    /// Paid and counted against stock.
    Completed,
    /// Cancelled; its stock was restored.
    Voided,
    /// Returned through a flow outside this core.
    Returned,
}

impl SaleState {
    /// States reported when no explicit filter is given.
    pub const REPORTING_DEFAULT: [SaleState; 2] = [SaleState::Completed, SaleState::Voided];

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleState::Completed => "completed",
            SaleState::Voided => "voided",
            SaleState::Returned => "returned",
        }
    }
}

impl fmt::Display for SaleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Ok(SaleState::Completed),
            "voided" => Ok(SaleState::Voided),
            "returned" => Ok(SaleState::Returned),
            other => Err(ValidationError::InvalidFormat {
                field: "state".to_string(),
                reason: format!("unknown sale state '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A requested line: product and quantity, before any pricing.
///
/// Used by both sale and order requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: f64,
}

impl LineRequest {
    pub fn new(product_id: impl Into<String>, quantity: f64) -> Self {
        LineRequest {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A line item of a sale.
///
/// Snapshot pattern: description, measure and unit price are frozen at the
/// time of sale so later catalog changes never alter history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub product_id: String,
    /// Description at time of sale (frozen).
    pub description: String,
    /// Unit of measure at time of sale (frozen).
    pub unit_of_measure: UnitOfMeasure,
    pub quantity: f64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// quantity × unit price, rounded to the cent (display only).
    pub line_total_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A recorded sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Sale timestamp.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub items: Vec<SaleItem>,
    /// round(Σ quantity × unit price), in cents.
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    /// Session that was open when the sale was recorded. Immutable.
    pub cash_session_id: Option<String>,
    pub state: SaleState,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Decides what a cancellation request means for this sale.
    ///
    /// ## Returns
    /// * `Ok(true)` - Completed, cancellation must restore stock and void
    /// * `Ok(false)` - Already voided, cancellation is a no-op
    /// * `Err(InvalidSaleState)` - any other state
    pub fn check_cancellable(&self) -> CoreResult<bool> {
        match self.state {
            SaleState::Completed => Ok(true),
            SaleState::Voided => Ok(false),
            SaleState::Returned => Err(CoreError::InvalidSaleState {
                sale_id: self.id.clone(),
                state: self.state,
            }),
        }
    }
}

// =============================================================================
// Cash Session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CashSessionState {
    Open,
    /// Reserved; never set by this core.
    Paused,
    Closed,
}

impl CashSessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashSessionState::Open => "open",
            CashSessionState::Paused => "paused",
            CashSessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for CashSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cash-drawer session.
///
/// Created by open, mutated exactly once by close, never reopened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub opening_amount_cents: i64,
    /// opening amount + cash sales, computed at close.
    pub calculated_closing_amount_cents: Option<i64>,
    /// Counted by the operator at close.
    pub real_closing_amount_cents: Option<i64>,
    pub state: CashSessionState,
    pub owner_user_id: String,
    pub closed_by: Option<String>,
    pub notes: Option<String>,
}

impl CashSession {
    #[inline]
    pub fn opening_amount(&self) -> Money {
        Money::from_cents(self.opening_amount_cents)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == CashSessionState::Open
    }

    /// real − calculated, once the session is closed.
    pub fn discrepancy(&self) -> Option<Money> {
        match (
            self.real_closing_amount_cents,
            self.calculated_closing_amount_cents,
        ) {
            (Some(real), Some(calculated)) => Some(Money::from_cents(real - calculated)),
            _ => None,
        }
    }
}

// =============================================================================
// Order State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderState {
    Pending,
    Confirmed,
    /// Always carries a linked sale.
    Delivered,
    Cancelled,
}

/// Outcome of a legal order transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changes and must be persisted.
    Change,
    /// Target equals the current state; nothing to write.
    NoOp,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "pending",
            OrderState::Confirmed => "confirmed",
            OrderState::Delivered => "delivered",
            OrderState::Cancelled => "cancelled",
        }
    }

    /// Validates `self → to` against the order state machine.
    ///
    /// ## Transition Table
    /// ```text
    /// Pending   → Confirmed | Cancelled
    /// Confirmed → Delivered (needs a linked sale) | Cancelled
    /// Delivered → Delivered (no-op, terminal)
    /// Cancelled → Pending (reopen) | Cancelled (no-op)
    /// ```
    /// Anything else is `InvalidTransition`.
    pub fn check_transition(
        self,
        order_id: &str,
        to: OrderState,
        has_linked_sale: bool,
    ) -> CoreResult<Transition> {
        use OrderState::*;

        let invalid = || CoreError::InvalidTransition {
            order_id: order_id.to_string(),
            from: self,
            to,
        };

        match (self, to) {
            (Pending, Confirmed) | (Pending, Cancelled) => Ok(Transition::Change),
            (Pending, Pending) | (Pending, Delivered) => Err(invalid()),

            (Confirmed, Delivered) if has_linked_sale => Ok(Transition::Change),
            (Confirmed, Delivered) => Err(CoreError::NoLinkedSale(order_id.to_string())),
            (Confirmed, Cancelled) => Ok(Transition::Change),
            (Confirmed, Pending) | (Confirmed, Confirmed) => Err(invalid()),

            (Delivered, Delivered) => Ok(Transition::NoOp),
            (Delivered, Pending) | (Delivered, Confirmed) | (Delivered, Cancelled) => {
                Err(invalid())
            }

            (Cancelled, Pending) => Ok(Transition::Change),
            (Cancelled, Cancelled) => Ok(Transition::NoOp),
            (Cancelled, Confirmed) | (Cancelled, Delivered) => Err(invalid()),
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderState::Pending),
            "confirmed" => Ok(OrderState::Confirmed),
            "delivered" => Ok(OrderState::Delivered),
            "cancelled" | "canceled" => Ok(OrderState::Cancelled),
            other => Err(ValidationError::InvalidFormat {
                field: "state".to_string(),
                reason: format!("unknown order state '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A line of a customer order. Priced lazily from the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: f64,
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub client: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub state: OrderState,
    /// Set exactly once, together with `state = Delivered`.
    pub linked_sale_id: Option<String>,
    pub created_by: String,
}

impl Order {
    /// Validates a requested state change for this order.
    pub fn check_transition(&self, to: OrderState) -> CoreResult<Transition> {
        self.state
            .check_transition(&self.id, to, self.linked_sale_id.is_some())
    }

    /// Checks that the order can be turned into a sale.
    pub fn check_convertible(&self) -> CoreResult<()> {
        if let Some(sale_id) = &self.linked_sale_id {
            return Err(CoreError::AlreadyConverted {
                order_id: self.id.clone(),
                sale_id: sale_id.clone(),
            });
        }

        match self.state {
            OrderState::Cancelled => Err(CoreError::OrderCancelled(self.id.clone())),
            OrderState::Pending | OrderState::Confirmed => Ok(()),
            // A delivered order always has a linked sale, handled above.
            OrderState::Delivered => Err(CoreError::InvalidTransition {
                order_id: self.id.clone(),
                from: self.state,
                to: OrderState::Delivered,
            }),
        }
    }

    /// The order's lines as sale request lines.
    pub fn to_line_requests(&self) -> Vec<LineRequest> {
        self.items
            .iter()
            .map(|item| LineRequest::new(item.product_id.clone(), item.quantity))
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(state: OrderState, linked_sale_id: Option<&str>) -> Order {
        let now = Utc::now();
        Order {
            id: "o-1".to_string(),
            created_at: now,
            updated_at: now,
            client: Some("Trattoria Da Mario".to_string()),
            notes: None,
            items: vec![OrderItem {
                product_id: "p-1".to_string(),
                quantity: 2.0,
            }],
            state,
            linked_sale_id: linked_sale_id.map(str::to_string),
            created_by: "u-1".to_string(),
        }
    }

    #[test]
    fn test_order_transition_table() {
        use OrderState::*;

        let allowed = [
            (Pending, Confirmed, Transition::Change),
            (Pending, Cancelled, Transition::Change),
            (Confirmed, Cancelled, Transition::Change),
            (Delivered, Delivered, Transition::NoOp),
            (Cancelled, Pending, Transition::Change),
            (Cancelled, Cancelled, Transition::NoOp),
        ];
        for (from, to, expected) in allowed {
            assert_eq!(from.check_transition("o", to, false).unwrap(), expected);
        }

        let rejected = [
            (Pending, Pending),
            (Pending, Delivered),
            (Confirmed, Pending),
            (Confirmed, Confirmed),
            (Delivered, Pending),
            (Delivered, Confirmed),
            (Delivered, Cancelled),
            (Cancelled, Confirmed),
            (Cancelled, Delivered),
        ];
        for (from, to) in rejected {
            assert!(matches!(
                from.check_transition("o", to, true),
                Err(CoreError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_confirmed_to_delivered_needs_linked_sale() {
        assert!(matches!(
            OrderState::Confirmed.check_transition("o", OrderState::Delivered, false),
            Err(CoreError::NoLinkedSale(_))
        ));
        assert_eq!(
            OrderState::Confirmed
                .check_transition("o", OrderState::Delivered, true)
                .unwrap(),
            Transition::Change
        );
    }

    #[test]
    fn test_check_convertible() {
        assert!(order(OrderState::Pending, None).check_convertible().is_ok());
        assert!(order(OrderState::Confirmed, None).check_convertible().is_ok());
        assert!(matches!(
            order(OrderState::Cancelled, None).check_convertible(),
            Err(CoreError::OrderCancelled(_))
        ));
        assert!(matches!(
            order(OrderState::Delivered, Some("s-1")).check_convertible(),
            Err(CoreError::AlreadyConverted { .. })
        ));
    }

    #[test]
    fn test_sale_cancellable() {
        let now = Utc::now();
        let mut sale = Sale {
            id: "s-1".to_string(),
            created_at: now,
            items: vec![],
            total_cents: 0,
            payment_method: PaymentMethod::Cash,
            cash_session_id: None,
            state: SaleState::Completed,
            notes: None,
            created_by: "u-1".to_string(),
            voided_at: None,
        };
        assert!(sale.check_cancellable().unwrap());

        sale.state = SaleState::Voided;
        assert!(!sale.check_cancellable().unwrap());

        sale.state = SaleState::Returned;
        assert!(matches!(
            sale.check_cancellable(),
            Err(CoreError::InvalidSaleState { .. })
        ));
    }

    #[test]
    fn test_state_parsing() {
        assert_eq!("Confirmed".parse::<OrderState>().unwrap(), OrderState::Confirmed);
        assert_eq!("canceled".parse::<OrderState>().unwrap(), OrderState::Cancelled);
        assert!("shipped".parse::<OrderState>().is_err());
        assert_eq!("voided".parse::<SaleState>().unwrap(), SaleState::Voided);
    }

    #[test]
    fn test_enum_wire_format() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::DigitalWallet).unwrap(),
            "\"digital_wallet\""
        );
        assert_eq!(
            serde_json::to_string(&UnitOfMeasure::Weight).unwrap(),
            "\"weight\""
        );
        assert_eq!(PaymentMethod::BankTransfer.to_string(), "bank_transfer");
    }

    #[test]
    fn test_discrepancy() {
        let session = CashSession {
            id: "c-1".to_string(),
            opened_at: Utc::now(),
            closed_at: Some(Utc::now()),
            opening_amount_cents: 500_000,
            calculated_closing_amount_cents: Some(675_000),
            real_closing_amount_cents: Some(670_000),
            state: CashSessionState::Closed,
            owner_user_id: "u-1".to_string(),
            closed_by: Some("u-1".to_string()),
            notes: None,
        };
        assert_eq!(session.discrepancy(), Some(Money::from_cents(-5_000)));
    }
}
