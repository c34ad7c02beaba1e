//! Fixtures for the engine's own tests and for downstream crates' tests. Enabled with the `test_utils` feature.
pub mod database;
pub mod inventory;
pub mod notifier;
pub mod prepare_env;
