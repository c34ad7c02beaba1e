use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    db_types::{ConsumerRecord, ProductKey},
    traits::{InventoryError, InventoryStore, ReserveResult},
};

/// Wraps an inventory and makes the next few consumption calls fail or hang, to exercise the timeout and retry
/// paths.
#[derive(Debug, Clone)]
pub struct FlakyInventory<I> {
    inner: I,
    failures: Arc<AtomicU32>,
    hangs: Arc<AtomicU32>,
}

impl<I> FlakyInventory<I> {
    pub fn new(inner: I) -> Self {
        Self { inner, failures: Arc::new(AtomicU32::new(0)), hangs: Arc::new(AtomicU32::new(0)) }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// The next `n` consumption calls fail with [`InventoryError::Unavailable`].
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// The next `n` consumption calls never complete.
    pub fn hang_next(&self, n: u32) {
        self.hangs.store(n, Ordering::SeqCst);
    }

    fn take(counter: &AtomicU32) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

impl<I: InventoryStore> InventoryStore for FlakyInventory<I> {
    async fn count_available(&self, product: &ProductKey) -> Result<i64, InventoryError> {
        self.inner.count_available(product).await
    }

    async fn reserve_and_consume(
        &self,
        product: &ProductKey,
        count: i64,
        consumer: &ConsumerRecord,
    ) -> Result<ReserveResult, InventoryError> {
        if Self::take(&self.hangs) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if Self::take(&self.failures) {
            return Err(InventoryError::Unavailable("Simulated inventory outage".into()));
        }
        self.inner.reserve_and_consume(product, count, consumer).await
    }

    async fn add_inventory_units(&self, product: &ProductKey, payloads: &[String]) -> Result<u64, InventoryError> {
        self.inner.add_inventory_units(product, payloads).await
    }
}
