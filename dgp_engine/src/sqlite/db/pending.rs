//! The pending expectations ledger.
//!
//! There are no delete statements here. Rows only ever change status.
use std::collections::HashSet;

use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{ExpectationStatus, Fingerprint, NewPendingExpectation, OrderCode, PendingExpectation},
    helpers::Allocation,
};

/// The fingerprints that a new allocation must avoid: every `Pending` expectation and every sighting ever recorded.
///
/// Sightings are unique per fingerprint and never deleted, so a fingerprint that has been sighted once, matched or
/// not, can never be issued again. A second payment of it would be rejected as a duplicate.
pub async fn live_fingerprints(conn: &mut SqliteConnection) -> Result<HashSet<Fingerprint>, sqlx::Error> {
    let live: Vec<Fingerprint> = sqlx::query_scalar(
        r#"
            SELECT fingerprint FROM pending_expectations WHERE status = $1
            UNION
            SELECT fingerprint FROM received_sightings
        "#,
    )
    .bind(ExpectationStatus::Pending)
    .fetch_all(conn)
    .await?;
    Ok(live.into_iter().collect())
}

pub async fn insert_pending(
    expectation: NewPendingExpectation,
    allocation: Allocation,
    conn: &mut SqliteConnection,
) -> Result<PendingExpectation, sqlx::Error> {
    let now = Utc::now();
    let rows: Vec<PendingExpectation> = sqlx::query_as(
        r#"
            INSERT INTO pending_expectations (
                order_code,
                session_id,
                base_amount,
                fingerprint,
                reference_code,
                degraded,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *;
        "#,
    )
    .bind(expectation.order_code)
    .bind(expectation.session_id)
    .bind(expectation.base_amount)
    .bind(allocation.fingerprint)
    .bind(expectation.reference_code)
    .bind(allocation.degraded)
    .bind(ExpectationStatus::Pending)
    .bind(now)
    .fetch_all(conn)
    .await?;
    let row = rows.into_iter().next().ok_or(sqlx::Error::RowNotFound)?;
    debug!("🗃️ Pending expectation {} stored for order {}", row.fingerprint, row.order_code);
    Ok(row)
}

pub async fn fetch_pending(
    code: &OrderCode,
    conn: &mut SqliteConnection,
) -> Result<Option<PendingExpectation>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM pending_expectations WHERE order_code = $1")
        .bind(code)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn fetch_by_fingerprint(
    fingerprint: &Fingerprint,
    conn: &mut SqliteConnection,
) -> Result<Vec<PendingExpectation>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM pending_expectations WHERE fingerprint = $1 ORDER BY created_at ASC")
        .bind(fingerprint)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn fetch_by_fingerprint_with_status(
    fingerprint: &Fingerprint,
    status: ExpectationStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<PendingExpectation>, sqlx::Error> {
    let rows = sqlx::query_as(
        "SELECT * FROM pending_expectations WHERE fingerprint = $1 AND status = $2 ORDER BY created_at ASC",
    )
    .bind(fingerprint)
    .bind(status)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn fetch_with_status(
    status: ExpectationStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<PendingExpectation>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM pending_expectations WHERE status = $1 ORDER BY created_at ASC")
        .bind(status)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Compare-and-set on the expectation status. Returns the updated row, or `None` if the row was not in status
/// `from`.
pub async fn update_status(
    code: &OrderCode,
    from: ExpectationStatus,
    to: ExpectationStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<PendingExpectation>, sqlx::Error> {
    let rows: Vec<PendingExpectation> = sqlx::query_as(
        r#"
            UPDATE pending_expectations SET status = $1, updated_at = $2
            WHERE order_code = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(Utc::now())
    .bind(code)
    .bind(from)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().next())
}
