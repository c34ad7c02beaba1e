use thiserror::Error;

use crate::{
    db_types::{ConsumerRecord, ProductKey},
    traits::data_objects::ReserveResult,
};

/// The finite unit inventory.
#[allow(async_fn_in_trait)]
pub trait InventoryStore: Clone {
    async fn count_available(&self, product: &ProductKey) -> Result<i64, InventoryError>;

    /// Reserves and consumes exactly `count` units of `product` for the consumer, or nothing at all.
    ///
    /// The call is idempotent per order code: if units have already been consumed for `consumer.order_code`, the
    /// same payloads are returned and nothing further is consumed.
    async fn reserve_and_consume(
        &self,
        product: &ProductKey,
        count: i64,
        consumer: &ConsumerRecord,
    ) -> Result<ReserveResult, InventoryError>;

    /// Adds deliverable units to the inventory. Returns the number of units added.
    async fn add_inventory_units(&self, product: &ProductKey, payloads: &[String]) -> Result<u64, InventoryError>;
}

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("The inventory is unavailable. {0}")]
    Unavailable(String),
    #[error("The inventory rejected the request. {0}")]
    Rejected(String),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::Unavailable(e.to_string())
    }
}
