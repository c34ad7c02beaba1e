//! # Backend contracts
//!
//! The engine never talks to a database, an inventory sheet or a chat front end directly. It talks to the traits in
//! this module, and a backend (e.g. [`crate::SqliteDatabase`]) implements them.
//!
//! * [`LedgerStore`] owns the two reconciliation ledgers: pending expectations (what we asked buyers to pay) and
//!   received sightings (what the operator saw arrive). Its mutations are the only way those tables change.
//! * [`OrderManagement`] stores orders and moves them through their lifecycle with compare-and-set transitions.
//! * [`CatalogManagement`] stores products and their advisory stock counts.
//! * [`InventoryStore`] is the finite unit inventory. Consumption is all-or-nothing.
//! * [`Notifier`] pushes messages to buyer sessions and alerts to the operator.
mod catalog_management;
mod data_objects;
mod inventory_store;
mod ledger_store;
mod notifier;
mod order_management;

pub use catalog_management::CatalogManagement;
pub use data_objects::{
    CancelPendingResult,
    InsertSightingResult,
    ManualReviewReason,
    MatchClaim,
    OperatorAlert,
    ReserveResult,
};
pub use inventory_store::{InventoryError, InventoryStore};
pub use ledger_store::{LedgerError, LedgerStore};
pub use notifier::{Notifier, NotifyError};
pub use order_management::OrderManagement;

/// Everything the order flow needs from its database backend.
pub trait EngineDatabase: LedgerStore + OrderManagement + CatalogManagement {}

impl<T> EngineDatabase for T where T: LedgerStore + OrderManagement + CatalogManagement {}
