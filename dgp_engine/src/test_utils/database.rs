use std::sync::{Arc, Mutex};

use dgp_common::Amount;

use crate::{
    db_types::{
        ExpectationStatus,
        Fingerprint,
        NewOrder,
        NewPendingExpectation,
        NewProduct,
        NewSighting,
        Order,
        OrderCode,
        OrderStatusType,
        OrderUpdate,
        PendingExpectation,
        Product,
        ProductKey,
        ReceivedSighting,
        SightingStatus,
    },
    traits::{
        CancelPendingResult,
        CatalogManagement,
        InsertSightingResult,
        LedgerError,
        LedgerStore,
        MatchClaim,
        OrderManagement,
    },
};

/// Wraps a database and makes order transitions to chosen statuses fail, to exercise the paths where a payment has
/// been claimed but the order cannot be updated.
#[derive(Debug, Clone)]
pub struct FlakyLedger<B> {
    inner: B,
    failing: Arc<Mutex<Vec<OrderStatusType>>>,
}

impl<B> FlakyLedger<B> {
    pub fn new(inner: B) -> Self {
        Self { inner, failing: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Every transition to `status` fails with a database error until [`Self::heal`] is called.
    pub fn fail_transitions_to(&self, status: OrderStatusType) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(status);
        }
    }

    pub fn heal(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    fn fails(&self, status: OrderStatusType) -> bool {
        self.failing.lock().map(|f| f.contains(&status)).unwrap_or(false)
    }
}

impl<B: LedgerStore> LedgerStore for FlakyLedger<B> {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn allocate_pending(&self, expectation: NewPendingExpectation) -> Result<PendingExpectation, LedgerError> {
        self.inner.allocate_pending(expectation).await
    }

    async fn fetch_pending(&self, order_code: &OrderCode) -> Result<Option<PendingExpectation>, LedgerError> {
        self.inner.fetch_pending(order_code).await
    }

    async fn fetch_pending_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<PendingExpectation>, LedgerError> {
        self.inner.fetch_pending_by_fingerprint(fingerprint).await
    }

    async fn fetch_pending_with_status(
        &self,
        status: ExpectationStatus,
    ) -> Result<Vec<PendingExpectation>, LedgerError> {
        self.inner.fetch_pending_with_status(status).await
    }

    async fn cancel_pending(&self, order_code: &OrderCode) -> Result<CancelPendingResult, LedgerError> {
        self.inner.cancel_pending(order_code).await
    }

    async fn insert_sighting(&self, sighting: NewSighting) -> Result<InsertSightingResult, LedgerError> {
        self.inner.insert_sighting(sighting).await
    }

    async fn fetch_sighting(&self, fingerprint: &Fingerprint) -> Result<Option<ReceivedSighting>, LedgerError> {
        self.inner.fetch_sighting(fingerprint).await
    }

    async fn fetch_sightings_with_status(&self, status: SightingStatus) -> Result<Vec<ReceivedSighting>, LedgerError> {
        self.inner.fetch_sightings_with_status(status).await
    }

    async fn claim_match(&self, fingerprint: &Fingerprint) -> Result<MatchClaim, LedgerError> {
        self.inner.claim_match(fingerprint).await
    }

    async fn claim_for_order(
        &self,
        order_code: &OrderCode,
        fingerprint: &Fingerprint,
    ) -> Result<MatchClaim, LedgerError> {
        self.inner.claim_for_order(order_code, fingerprint).await
    }

    async fn flag_manual_intervention(&self, order_code: &OrderCode) -> Result<PendingExpectation, LedgerError> {
        self.inner.flag_manual_intervention(order_code).await
    }
}

impl<B: OrderManagement> OrderManagement for FlakyLedger<B> {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError> {
        self.inner.insert_order(order).await
    }

    async fn fetch_order(&self, order_code: &OrderCode) -> Result<Option<Order>, LedgerError> {
        self.inner.fetch_order(order_code).await
    }

    async fn fetch_orders_with_status(&self, status: OrderStatusType) -> Result<Vec<Order>, LedgerError> {
        self.inner.fetch_orders_with_status(status).await
    }

    async fn transition_order(
        &self,
        order_code: &OrderCode,
        to: OrderStatusType,
        update: OrderUpdate,
    ) -> Result<Order, LedgerError> {
        if self.fails(to) {
            return Err(LedgerError::DatabaseError(format!("Simulated write failure moving {order_code} to {to}")));
        }
        self.inner.transition_order(order_code, to, update).await
    }
}

impl<B: CatalogManagement> CatalogManagement for FlakyLedger<B> {
    async fn fetch_product(&self, key: &ProductKey) -> Result<Option<Product>, LedgerError> {
        self.inner.fetch_product(key).await
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, LedgerError> {
        self.inner.fetch_products().await
    }

    async fn upsert_product(&self, product: NewProduct) -> Result<Product, LedgerError> {
        self.inner.upsert_product(product).await
    }

    async fn update_price(&self, key: &ProductKey, unit_price: Amount) -> Result<Product, LedgerError> {
        self.inner.update_price(key, unit_price).await
    }

    async fn update_cached_stock(&self, key: &ProductKey, available: i64) -> Result<Product, LedgerError> {
        self.inner.update_cached_stock(key, available).await
    }
}
