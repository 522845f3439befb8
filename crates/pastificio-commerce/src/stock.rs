//! # Stock Ledger
//!
//! The single writer of `stock_quantity`.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  try_consume(p, q)                                                     │
//! │    q > 0, finite ──► conditional UPDATE (CAS) ──► StockConsumption     │
//! │                              │                                          │
//! │                              └─ 0 rows ─► diagnostic read:              │
//! │                                  missing    → UnknownProduct            │
//! │                                  inactive   → ProductInactive           │
//! │                                  too little → InsufficientStock         │
//! │                                                                         │
//! │  try_restore(p, q)                                                     │
//! │    unconditional increment, only fails when the product is gone        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Integrality of `Unit`/`Box` quantities is checked by the sale engine
//! before consumption; the ledger only knows about positive amounts.

use pastificio_core::quantity::ensure_positive;
use pastificio_core::{CoreError, Money};
use pastificio_db::{ConsumeRejection, DbError, ProductRepository};
use tracing::debug;

use crate::error::CommerceResult;

/// Outcome of a successful consumption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockConsumption {
    /// Catalog price at the instant the stock was taken.
    pub unit_price: Money,
    pub remaining_stock: f64,
}

#[derive(Debug, Clone)]
pub struct StockLedger {
    products: ProductRepository,
}

impl StockLedger {
    pub fn new(products: ProductRepository) -> Self {
        StockLedger { products }
    }

    /// Takes `quantity` out of stock, fully or not at all.
    pub async fn try_consume(
        &self,
        product_id: &str,
        quantity: f64,
    ) -> CommerceResult<StockConsumption> {
        ensure_positive(product_id, quantity)?;

        match self.products.try_consume(product_id, quantity).await? {
            Ok(consumed) => Ok(StockConsumption {
                unit_price: Money::from_cents(consumed.unit_price_cents),
                remaining_stock: consumed.stock_quantity,
            }),
            Err(ConsumeRejection::Missing) => {
                Err(CoreError::UnknownProduct(product_id.to_string()).into())
            }
            Err(ConsumeRejection::Inactive) => {
                Err(CoreError::ProductInactive(product_id.to_string()).into())
            }
            Err(ConsumeRejection::Insufficient { available }) => {
                debug!(product_id = %product_id, available, requested = quantity, "Insufficient stock");
                Err(CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available,
                    requested: quantity,
                }
                .into())
            }
        }
    }

    /// Puts `quantity` back into stock. Returns the new stock level.
    pub async fn try_restore(&self, product_id: &str, quantity: f64) -> CommerceResult<f64> {
        ensure_positive(product_id, quantity)?;

        match self.products.restore(product_id, quantity).await {
            Ok(stock) => Ok(stock),
            Err(DbError::NotFound { .. }) => {
                Err(CoreError::UnknownProduct(product_id.to_string()).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Current stock of a product.
    pub async fn available(&self, product_id: &str) -> CommerceResult<f64> {
        self.products
            .stock_of(product_id)
            .await?
            .ok_or_else(|| CoreError::UnknownProduct(product_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{back_office, seed, shared_back_office};
    use crate::CommerceError;
    use pastificio_core::UnitOfMeasure;

    #[tokio::test]
    async fn test_consume_and_restore() {
        let office = back_office().await;
        seed(&office, "FUS-500", UnitOfMeasure::Unit, 320, 10.0).await;
        let ledger = office.stock();

        let consumed = ledger.try_consume("FUS-500", 3.0).await.unwrap();
        assert_eq!(consumed.unit_price, Money::from_cents(320));
        assert_eq!(consumed.remaining_stock, 7.0);

        assert_eq!(ledger.try_restore("FUS-500", 3.0).await.unwrap(), 10.0);
        assert_eq!(ledger.available("FUS-500").await.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn test_consume_rejections_leave_stock_untouched() {
        let office = back_office().await;
        seed(&office, "RAV-BOX", UnitOfMeasure::Box, 1800, 2.0).await;
        let ledger = office.stock();

        let err = ledger.try_consume("RAV-BOX", 3.0).await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Core(CoreError::InsufficientStock { available, requested, .. })
                if available == 2.0 && requested == 3.0
        ));

        assert!(matches!(
            ledger.try_consume("RAV-BOX", 0.0).await,
            Err(CommerceError::Core(CoreError::InvalidQuantity { .. }))
        ));
        assert!(matches!(
            ledger.try_consume("GHOST", 1.0).await,
            Err(CommerceError::Core(CoreError::UnknownProduct(_)))
        ));
        assert!(matches!(
            ledger.try_restore("GHOST", 1.0).await,
            Err(CommerceError::Core(CoreError::UnknownProduct(_)))
        ));

        assert_eq!(ledger.available("RAV-BOX").await.unwrap(), 2.0);
    }

    #[tokio::test]
    async fn test_inactive_product() {
        let office = back_office().await;
        let mut product = crate::testing::product("OLD", UnitOfMeasure::Unit, 100, 5.0);
        product.active = false;
        office.catalog().upsert(&product).await.unwrap();

        assert!(matches!(
            office.stock().try_consume("OLD", 1.0).await,
            Err(CommerceError::Core(CoreError::ProductInactive(_)))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumers_never_oversell() {
        let (office, _dir) = shared_back_office().await;
        seed(&office, "TOR-BOX", UnitOfMeasure::Box, 2100, 5.0).await;
        let ledger = office.stock();

        let attempts = (0..8).map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.try_consume("TOR-BOX", 1.0).await })
        });
        let mut succeeded = 0;
        for handle in attempts.collect::<Vec<_>>() {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(ledger.available("TOR-BOX").await.unwrap(), 0.0);
    }
}
