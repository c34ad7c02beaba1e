use dgp_common::Amount;

use crate::{
    db_types::{NewProduct, Product, ProductKey},
    traits::LedgerError,
};

#[allow(async_fn_in_trait)]
pub trait CatalogManagement: Clone {
    async fn fetch_product(&self, key: &ProductKey) -> Result<Option<Product>, LedgerError>;

    /// All products, ordered by category and variant.
    async fn fetch_products(&self) -> Result<Vec<Product>, LedgerError>;

    /// Inserts the product, or replaces the name and price of an existing product with the same key.
    async fn upsert_product(&self, product: NewProduct) -> Result<Product, LedgerError>;

    async fn update_price(&self, key: &ProductKey, unit_price: Amount) -> Result<Product, LedgerError>;

    /// Records the result of a stock refresh. The cached count is never decremented locally.
    async fn update_cached_stock(&self, key: &ProductKey, available: i64) -> Result<Product, LedgerError>;
}
