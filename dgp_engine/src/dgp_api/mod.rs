//! # Digital goods payment engine public API
//!
//! The `dgp_api` module exposes the programmatic API for the engine.
//!
//! * [`order_flow_api`] is the primary API. It creates orders, issues fingerprint amounts, records payment sightings
//!   and runs the matching engine.
//! * [`catalog_api`] manages products, prices and cached stock counts.
//! * [`fulfillment`] consumes inventory for matched orders and delivers the units.
//!
//! # API usage
//!
//! An API instance is created by supplying backends that implement the traits the API needs.
//!
//! ```rust,ignore
//! use dgp_engine::{OrderFlowApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase is both the ledger store and the inventory
//! let api = OrderFlowApi::new(db.clone(), db, notifier, EventProducers::default(), FlowConfig::default());
//! let order = api.create_order(&product, 3, buyer).await?;
//! let request = api.request_payment(&order.order_code).await?;
//! ```
pub mod catalog_api;
pub mod errors;
pub mod fulfillment;
pub mod order_flow_api;
pub mod order_objects;
