//! The received sightings ledger. Sightings are inserted once and never deleted or overwritten.
use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Fingerprint, NewSighting, OrderCode, ReceivedSighting, SightingStatus},
    traits::{InsertSightingResult, LedgerError},
};

/// Inserts the sighting, or returns the existing row if the fingerprint has been sighted before.
pub async fn idempotent_insert(
    sighting: NewSighting,
    conn: &mut SqliteConnection,
) -> Result<InsertSightingResult, LedgerError> {
    let fingerprint = sighting.fingerprint.clone();
    let result: Result<Vec<ReceivedSighting>, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO received_sightings (fingerprint, observed_at, recorded_at, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(sighting.fingerprint)
    .bind(sighting.observed_at)
    .bind(Utc::now())
    .bind(SightingStatus::Unmatched)
    .fetch_all(&mut *conn)
    .await;
    match result.map(|rows| rows.into_iter().next()) {
        Ok(Some(row)) => {
            debug!("🗃️ Sighting of {fingerprint} recorded");
            Ok(InsertSightingResult::Inserted(row))
        },
        Ok(None) => Err(LedgerError::DatabaseError(format!("Sighting {fingerprint} was stored, but not returned"))),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_sighting(&fingerprint, conn).await?.ok_or_else(|| {
                LedgerError::DatabaseError(format!("Sighting {fingerprint} collided, but cannot be read back"))
            })?;
            debug!("🗃️ Sighting of {fingerprint} already exists ({})", existing.status);
            Ok(InsertSightingResult::Duplicate(existing))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_sighting(
    fingerprint: &Fingerprint,
    conn: &mut SqliteConnection,
) -> Result<Option<ReceivedSighting>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM received_sightings WHERE fingerprint = $1")
        .bind(fingerprint)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn fetch_with_status(
    status: SightingStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<ReceivedSighting>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM received_sightings WHERE status = $1 ORDER BY observed_at ASC")
        .bind(status)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Compare-and-set `Unmatched -> Matched`. Returns the updated row, or `None` if it was already matched.
pub async fn mark_matched(
    fingerprint: &Fingerprint,
    order_code: &OrderCode,
    conn: &mut SqliteConnection,
) -> Result<Option<ReceivedSighting>, sqlx::Error> {
    let rows: Vec<ReceivedSighting> = sqlx::query_as(
        r#"
            UPDATE received_sightings SET status = $1, matched_order = $2
            WHERE fingerprint = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(SightingStatus::Matched)
    .bind(order_code)
    .bind(fingerprint)
    .bind(SightingStatus::Unmatched)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().next())
}
