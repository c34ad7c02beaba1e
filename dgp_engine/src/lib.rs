//! Digital Goods Payment Engine
//!
//! The engine sells units of finite digital inventory (codes, logins, links) against payments that it cannot see
//! directly. Each order is asked to pay a unique "fingerprint" amount: its total plus a sub-cent offset. An operator
//! reports the amounts that actually arrive, and the engine matches each reported amount to exactly one order before
//! consuming inventory and delivering the units.
//!
//! The library is divided into these main sections:
//! 1. The backend contracts ([`mod@traits`]) and the data types they store ([`mod@db_types`]). SQLite is the supported
//!    backend, and also provides the reference unit inventory.
//! 2. The public API ([`OrderFlowApi`], [`CatalogApi`]). This is what front ends and servers should use.
//! 3. Events ([`mod@events`]) that can be subscribed to, such as completed orders and cases that need manual review.
pub mod db_types;
mod dgp_api;
pub mod events;
pub mod helpers;
pub mod order_state;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use dgp_api::{
    catalog_api::CatalogApi,
    errors::{CatalogError, OrderFlowError},
    fulfillment::{delivery_message, DeliveryOutcome, FulfillmentCoordinator, FulfillmentFailure},
    order_flow_api::{payment_instructions, OrderFlowApi},
    order_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CatalogManagement,
    EngineDatabase,
    InventoryError,
    InventoryStore,
    LedgerError,
    LedgerStore,
    Notifier,
    NotifyError,
    OrderManagement,
};
