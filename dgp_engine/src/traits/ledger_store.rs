use thiserror::Error;

use crate::{
    db_types::{
        ExpectationStatus,
        Fingerprint,
        NewPendingExpectation,
        NewSighting,
        OrderCode,
        OrderStatusType,
        PendingExpectation,
        ProductKey,
        ReceivedSighting,
        SightingStatus,
    },
    traits::data_objects::{CancelPendingResult, InsertSightingResult, MatchClaim},
};

/// The two reconciliation ledgers.
///
/// Implementations must serialise [`LedgerStore::allocate_pending`] and [`LedgerStore::claim_match`] against each
/// other, so that the set of live fingerprints cannot change between reading it and acting on it.
#[allow(async_fn_in_trait)]
pub trait LedgerStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Issues a fingerprint for the order and records the pending expectation, atomically.
    ///
    /// The live set is every `Pending` expectation fingerprint plus every sighted fingerprint, matched or not. If the
    /// order already has a `Pending` expectation, that row is returned unchanged and no new fingerprint is minted.
    /// If every offset at this base price is live, the row is stored with the bare base amount and `degraded` set.
    async fn allocate_pending(&self, expectation: NewPendingExpectation) -> Result<PendingExpectation, LedgerError>;

    async fn fetch_pending(&self, order_code: &OrderCode) -> Result<Option<PendingExpectation>, LedgerError>;

    /// All expectations (of any status) that were issued the given fingerprint.
    async fn fetch_pending_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<PendingExpectation>, LedgerError>;

    async fn fetch_pending_with_status(
        &self,
        status: ExpectationStatus,
    ) -> Result<Vec<PendingExpectation>, LedgerError>;

    /// Moves the order's expectation from `Pending` to `Cancelled` as a single compare-and-set. This releases the
    /// fingerprint for reuse.
    async fn cancel_pending(&self, order_code: &OrderCode) -> Result<CancelPendingResult, LedgerError>;

    /// Stores a new sighting. A second sighting for the same fingerprint is rejected, whatever the status of the
    /// first one, and the stored row is returned untouched.
    async fn insert_sighting(&self, sighting: NewSighting) -> Result<InsertSightingResult, LedgerError>;

    async fn fetch_sighting(&self, fingerprint: &Fingerprint) -> Result<Option<ReceivedSighting>, LedgerError>;

    async fn fetch_sightings_with_status(&self, status: SightingStatus) -> Result<Vec<ReceivedSighting>, LedgerError>;

    /// The match chokepoint. In one transaction:
    /// * requires an `Unmatched` sighting for the fingerprint,
    /// * requires exactly one `Pending`, non-degraded expectation with the same fingerprint,
    /// * moves that expectation to `Completed` and the sighting to `Matched`.
    ///
    /// Any other situation is reported in the [`MatchClaim`] and nothing is changed.
    async fn claim_match(&self, fingerprint: &Fingerprint) -> Result<MatchClaim, LedgerError>;

    /// The operator's override of [`LedgerStore::claim_match`]. The sighting is assigned to the named order, even if
    /// the order's expectation is degraded, shares its fingerprint with other orders, or was issued a different
    /// fingerprint. The order's expectation must still be `Pending` and the sighting `Unmatched`.
    ///
    /// [`MatchClaim::NoPendingOrder`] means the order has no `Pending` expectation. Nothing is changed unless the
    /// result is [`MatchClaim::Claimed`].
    async fn claim_for_order(
        &self,
        order_code: &OrderCode,
        fingerprint: &Fingerprint,
    ) -> Result<MatchClaim, LedgerError>;

    /// Moves a `Completed` expectation to `ManualInterventionRequired`, after its match could not be fulfilled.
    async fn flag_manual_intervention(&self, order_code: &OrderCode) -> Result<PendingExpectation, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with code {0}")]
    OrderAlreadyExists(OrderCode),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderCode),
    #[error("The product {0} does not exist")]
    ProductNotFound(ProductKey),
    #[error("Order {order_code} cannot move from {from} to {to}")]
    IllegalTransition { order_code: OrderCode, from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} has no pending expectation")]
    ExpectationNotFound(OrderCode),
    #[error("The expectation for order {order_code} is {status}, and cannot be changed")]
    ExpectationClosed { order_code: OrderCode, status: ExpectationStatus },
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
