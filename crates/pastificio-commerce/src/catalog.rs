//! # Catalog
//!
//! Read access to the product catalog. The catalog itself (descriptions,
//! prices, activation) is maintained outside the commerce core; sales and
//! orders look products up in batches.

use std::collections::HashMap;

use pastificio_core::Product;
use pastificio_db::ProductRepository;

use crate::error::CommerceResult;

/// Product lookups used by the engines.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: ProductRepository,
}

impl Catalog {
    pub fn new(products: ProductRepository) -> Self {
        Catalog { products }
    }

    /// Looks many products up in one query. Unknown ids are absent.
    pub async fn get_products(&self, ids: &[String]) -> CommerceResult<HashMap<String, Product>> {
        Ok(self.products.get_many(ids).await?)
    }

    /// Writes a catalog entry.
    #[cfg(test)]
    pub(crate) async fn upsert(&self, product: &Product) -> CommerceResult<()> {
        Ok(self.products.upsert(product).await?)
    }
}
