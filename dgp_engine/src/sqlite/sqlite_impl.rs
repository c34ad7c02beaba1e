//! `SqliteDatabase` is a concrete implementation of a digital goods payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module, including the reference implementation of the unit inventory.
//!
//! The two ledger chokepoints (allocation and match claim) and inventory consumption run under an in-process async
//! lock, inside a transaction that takes SQLite's write lock before it reads anything. The lock is shared by every
//! clone of the database handle.
use std::{fmt::Debug, sync::Arc};

use dgp_common::Amount;
use log::*;
use sqlx::{migrate::Migrator, SqlitePool};
use tokio::sync::Mutex;

use super::db::{db_url, inventory, new_pool, orders, pending, products, sightings, take_write_lock};
use crate::{
    db_types::{
        ConsumerRecord,
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
    helpers::allocate_fingerprint,
    traits::{
        CancelPendingResult,
        CatalogManagement,
        InsertSightingResult,
        InventoryError,
        InventoryStore,
        LedgerError,
        LedgerStore,
        MatchClaim,
        OrderManagement,
        ReserveResult,
    },
};

static MIGRATOR: Migrator = sqlx::migrate!("./src/sqlite/migrations");

// Keeps bulk inserts well under SQLite's bound-parameter limit.
const UNIT_INSERT_CHUNK: usize = 200;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    ledger_lock: Arc<Mutex<()>>,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl LedgerStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn allocate_pending(&self, expectation: NewPendingExpectation) -> Result<PendingExpectation, LedgerError> {
        let _guard = self.ledger_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        take_write_lock(&mut tx).await?;
        if let Some(existing) = pending::fetch_pending(&expectation.order_code, &mut tx).await? {
            return match existing.status {
                ExpectationStatus::Pending => {
                    debug!("🧮️ Order {} already holds fingerprint {}", existing.order_code, existing.fingerprint);
                    Ok(existing)
                },
                status => Err(LedgerError::ExpectationClosed { order_code: existing.order_code, status }),
            };
        }
        let live = pending::live_fingerprints(&mut tx).await?;
        let allocation = {
            let mut rng = rand::thread_rng();
            allocate_fingerprint(expectation.base_amount, &live, &mut rng)
        };
        let row = pending::insert_pending(expectation, allocation, &mut tx).await?;
        tx.commit().await?;
        info!("🧮️ Order {} must pay {} (live set had {} entries)", row.order_code, row.fingerprint, live.len());
        Ok(row)
    }

    async fn fetch_pending(&self, order_code: &OrderCode) -> Result<Option<PendingExpectation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let row = pending::fetch_pending(order_code, &mut conn).await?;
        Ok(row)
    }

    async fn fetch_pending_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<PendingExpectation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let rows = pending::fetch_by_fingerprint(fingerprint, &mut conn).await?;
        Ok(rows)
    }

    async fn fetch_pending_with_status(
        &self,
        status: ExpectationStatus,
    ) -> Result<Vec<PendingExpectation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let rows = pending::fetch_with_status(status, &mut conn).await?;
        Ok(rows)
    }

    async fn cancel_pending(&self, order_code: &OrderCode) -> Result<CancelPendingResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        take_write_lock(&mut tx).await?;
        let cancelled =
            pending::update_status(order_code, ExpectationStatus::Pending, ExpectationStatus::Cancelled, &mut tx)
                .await?;
        let result = match cancelled {
            Some(row) => {
                debug!("🗃️ Fingerprint {} released by order {order_code}", row.fingerprint);
                CancelPendingResult::Cancelled(row)
            },
            None => match pending::fetch_pending(order_code, &mut tx).await? {
                Some(row) => CancelPendingResult::NotPending(row),
                None => CancelPendingResult::NoExpectation,
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn insert_sighting(&self, sighting: NewSighting) -> Result<InsertSightingResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        take_write_lock(&mut tx).await?;
        let result = sightings::idempotent_insert(sighting, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_sighting(&self, fingerprint: &Fingerprint) -> Result<Option<ReceivedSighting>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let row = sightings::fetch_sighting(fingerprint, &mut conn).await?;
        Ok(row)
    }

    async fn fetch_sightings_with_status(&self, status: SightingStatus) -> Result<Vec<ReceivedSighting>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sightings::fetch_with_status(status, &mut conn).await?;
        Ok(rows)
    }

    async fn claim_match(&self, fingerprint: &Fingerprint) -> Result<MatchClaim, LedgerError> {
        let _guard = self.ledger_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        take_write_lock(&mut tx).await?;
        let sighting = match sightings::fetch_sighting(fingerprint, &mut tx).await? {
            None => return Ok(MatchClaim::NoSighting),
            Some(s) if s.status == SightingStatus::Matched => {
                return Ok(MatchClaim::AlreadyMatched { order_code: s.matched_order });
            },
            Some(s) => s,
        };
        let candidates =
            pending::fetch_by_fingerprint_with_status(fingerprint, ExpectationStatus::Pending, &mut tx).await?;
        let candidate = match candidates.as_slice() {
            [] => return Ok(MatchClaim::NoPendingOrder),
            [only] if !only.degraded => only.clone(),
            _ => {
                let candidates = candidates.iter().map(|c| c.order_code.clone()).collect();
                return Ok(MatchClaim::Ambiguous { candidates });
            },
        };
        let code = candidate.order_code;
        let expectation =
            pending::update_status(&code, ExpectationStatus::Pending, ExpectationStatus::Completed, &mut tx).await?;
        let sighting = sightings::mark_matched(&sighting.fingerprint, &code, &mut tx).await?;
        match (expectation, sighting) {
            (Some(expectation), Some(sighting)) => {
                tx.commit().await?;
                debug!("🗃️ Sighting {fingerprint} claimed by order {code}");
                Ok(MatchClaim::Claimed { expectation, sighting })
            },
            // Both rows were read under the lock, so this means something outside the engine wrote to the ledger.
            _ => {
                error!("🗃️ Compare-and-set for {fingerprint} / {code} failed. Rolling back the claim.");
                tx.rollback().await?;
                Err(LedgerError::DatabaseError(format!("The ledger rows for {fingerprint} changed during the claim")))
            },
        }
    }

    async fn claim_for_order(
        &self,
        order_code: &OrderCode,
        fingerprint: &Fingerprint,
    ) -> Result<MatchClaim, LedgerError> {
        let _guard = self.ledger_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        take_write_lock(&mut tx).await?;
        match sightings::fetch_sighting(fingerprint, &mut tx).await? {
            None => return Ok(MatchClaim::NoSighting),
            Some(s) if s.status == SightingStatus::Matched => {
                return Ok(MatchClaim::AlreadyMatched { order_code: s.matched_order });
            },
            Some(_) => {},
        }
        let expectation =
            pending::update_status(order_code, ExpectationStatus::Pending, ExpectationStatus::Completed, &mut tx)
                .await?;
        let Some(expectation) = expectation else {
            return Ok(MatchClaim::NoPendingOrder);
        };
        if expectation.fingerprint != *fingerprint {
            warn!(
                "🗃️ Order {order_code} was issued {}, but is being settled with {fingerprint}",
                expectation.fingerprint
            );
        }
        match sightings::mark_matched(fingerprint, order_code, &mut tx).await? {
            Some(sighting) => {
                tx.commit().await?;
                debug!("🗃️ Sighting {fingerprint} assigned to order {order_code} by the operator");
                Ok(MatchClaim::Claimed { expectation, sighting })
            },
            None => {
                error!("🗃️ Sighting {fingerprint} changed during the claim by {order_code}. Rolling back.");
                tx.rollback().await?;
                Err(LedgerError::DatabaseError(format!("The ledger rows for {fingerprint} changed during the claim")))
            },
        }
    }

    async fn flag_manual_intervention(&self, order_code: &OrderCode) -> Result<PendingExpectation, LedgerError> {
        let mut tx = self.pool.begin().await?;
        take_write_lock(&mut tx).await?;
        let flagged = pending::update_status(
            order_code,
            ExpectationStatus::Completed,
            ExpectationStatus::ManualInterventionRequired,
            &mut tx,
        )
        .await?;
        match flagged {
            Some(row) => {
                tx.commit().await?;
                Ok(row)
            },
            None => match pending::fetch_pending(order_code, &mut tx).await? {
                Some(row) => Err(LedgerError::ExpectationClosed { order_code: row.order_code, status: row.status }),
                None => Err(LedgerError::ExpectationNotFound(order_code.clone())),
            },
        }
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB", order.order_code);
        Ok(order)
    }

    async fn fetch_order(&self, order_code: &OrderCode) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_code, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_with_status(&self, status: OrderStatusType) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_with_status(status, &mut conn).await?;
        Ok(orders)
    }

    async fn transition_order(
        &self,
        order_code: &OrderCode,
        to: OrderStatusType,
        update: OrderUpdate,
    ) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        take_write_lock(&mut tx).await?;
        let order = orders::transition_order(order_code, to, update, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, key: &ProductKey) -> Result<Option<Product>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(key, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(&mut conn).await?;
        Ok(products)
    }

    async fn upsert_product(&self, product: NewProduct) -> Result<Product, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let product = products::upsert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn update_price(&self, key: &ProductKey, unit_price: Amount) -> Result<Product, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let product = products::update_price(key, unit_price, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn update_cached_stock(&self, key: &ProductKey, available: i64) -> Result<Product, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let product = products::update_cached_stock(key, available, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }
}

impl InventoryStore for SqliteDatabase {
    async fn count_available(&self, product: &ProductKey) -> Result<i64, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let count = inventory::count_available(product, &mut conn).await?;
        Ok(count)
    }

    async fn reserve_and_consume(
        &self,
        product: &ProductKey,
        count: i64,
        consumer: &ConsumerRecord,
    ) -> Result<ReserveResult, InventoryError> {
        if count <= 0 {
            return Err(InventoryError::Rejected(format!("Cannot consume {count} units")));
        }
        let _guard = self.ledger_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        take_write_lock(&mut tx).await?;
        let code = &consumer.order_code;
        let already = inventory::consumed_for_order(code, &mut tx).await?;
        if !already.is_empty() {
            return if already.len() as i64 == count {
                debug!("📦️ Order {code} already consumed its {count} units. Returning the same payload.");
                Ok(ReserveResult::Consumed(already))
            } else {
                Err(InventoryError::Rejected(format!(
                    "Order {code} already holds {} units, but {count} were requested",
                    already.len()
                )))
            };
        }
        let units = inventory::select_available(product, count, &mut tx).await?;
        if (units.len() as i64) < count {
            debug!("📦️ Only {} of {count} units of {product} are available for order {code}", units.len());
            return Ok(ReserveResult::InsufficientStock { available: units.len() as i64 });
        }
        let ids = units.iter().map(|(id, _)| *id).collect::<Vec<i64>>();
        let consumed = inventory::consume_units(&ids, consumer, &mut tx).await?;
        if consumed != count as u64 {
            tx.rollback().await?;
            return Ok(ReserveResult::InsufficientStock { available: consumed as i64 });
        }
        tx.commit().await?;
        info!("📦️ {count} units of {product} consumed by order {code}");
        Ok(ReserveResult::Consumed(units.into_iter().map(|(_, payload)| payload).collect()))
    }

    async fn add_inventory_units(&self, product: &ProductKey, payloads: &[String]) -> Result<u64, InventoryError> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for chunk in payloads.chunks(UNIT_INSERT_CHUNK) {
            added += inventory::add_units(product, chunk, &mut tx).await?;
        }
        tx.commit().await?;
        info!("📦️ {added} units of {product} added to the inventory");
        Ok(added)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool, ledger_lock: Arc::new(Mutex::new(())) })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        MIGRATOR.run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }
}
