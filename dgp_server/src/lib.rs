//! # DGP server
//! This crate hosts the HTTP server for the digital goods payment engine. It is responsible for:
//! * Accepting orders, payment requests, payment confirmations and cancellations from the conversation front end.
//! * Accepting payment sightings and catalog changes from the operator.
//! * Delivering messages to buyers and alerts to the operator through a webhook.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Buyer-facing routes, called by the front end. Requests must carry an HMAC signature made with the
//!   front end secret.
//! * `/operator/...`: Operator routes. Requests must carry an HMAC signature made with the operator secret.
pub mod audit_hooks;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod notifier;
pub mod routes;
pub mod server;
pub mod stock_worker;

#[cfg(test)]
mod endpoint_tests;
