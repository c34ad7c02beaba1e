use dgp_engine::{
    db_types::{ConsumerRecord, ProductKey},
    traits::ReserveResult,
    InventoryError,
    InventoryStore,
};
use mockall::mock;

mock! {
    pub Inventory {}
    impl Clone for Inventory {
        fn clone(&self) -> Self;
    }
    impl InventoryStore for Inventory {
        async fn count_available(&self, product: &ProductKey) -> Result<i64, InventoryError>;
        async fn reserve_and_consume(&self, product: &ProductKey, count: i64, consumer: &ConsumerRecord) -> Result<ReserveResult, InventoryError>;
        async fn add_inventory_units(&self, product: &ProductKey, payloads: &[String]) -> Result<u64, InventoryError>;
    }
}

/// An inventory that cannot be reached, however many times it is cloned.
pub fn unreachable_inventory() -> MockInventory {
    let mut inventory = MockInventory::new();
    inventory.expect_count_available().returning(|_| Err(InventoryError::Unavailable("connection refused".into())));
    inventory
        .expect_reserve_and_consume()
        .returning(|_, _, _| Err(InventoryError::Unavailable("connection refused".into())));
    inventory
        .expect_add_inventory_units()
        .returning(|_, _| Err(InventoryError::Unavailable("connection refused".into())));
    inventory.expect_clone().returning(unreachable_inventory);
    inventory
}
