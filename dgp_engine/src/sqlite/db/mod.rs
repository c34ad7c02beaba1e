//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! Statements with a `RETURNING` clause are always read with `fetch_all`. SQLite only finishes a write statement once
//! it has been stepped to the end, and a half-read statement keeps its write open on that connection.
use std::{env, str::FromStr, time::Duration};

use chrono::Utc;
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqliteConnection,
    SqlitePool,
};

pub mod inventory;
pub mod orders;
pub mod pending;
pub mod products;
pub mod sightings;

const SQLITE_DB_URL: &str = "sqlite://data/dgp_store.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("DGP_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ DGP_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Takes SQLite's write lock for the current transaction.
///
/// Call this first in any transaction that reads and then writes. A deferred transaction that reads first can
/// otherwise fail with `SQLITE_BUSY` when another connection commits in between.
pub async fn take_write_lock(conn: &mut SqliteConnection) -> Result<(), SqlxError> {
    sqlx::query("UPDATE write_gate SET touched_at = $1 WHERE id = 1").bind(Utc::now()).execute(conn).await?;
    Ok(())
}
