//! The local unit inventory.
//!
//! Each row is one deliverable unit (a code, a login, a link). A unit is consumed by stamping it with the buyer's
//! order code and clearing `available`. Units are never deleted.
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{ConsumerRecord, OrderCode, ProductKey};

pub async fn count_available(key: &ProductKey, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inventory_units WHERE category = $1 AND variant = $2 AND available = 1",
    )
    .bind(&key.category)
    .bind(&key.variant)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Payloads already consumed by the order, in the order they were added to the inventory.
pub async fn consumed_for_order(code: &OrderCode, conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let payloads = sqlx::query_scalar("SELECT payload FROM inventory_units WHERE order_code = $1 ORDER BY id ASC")
        .bind(code)
        .fetch_all(conn)
        .await?;
    Ok(payloads)
}

/// The oldest `limit` available units of the product, as `(id, payload)` pairs.
pub async fn select_available(
    key: &ProductKey,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<(i64, String)>, sqlx::Error> {
    let units = sqlx::query_as(
        r#"
            SELECT id, payload FROM inventory_units
            WHERE category = $1 AND variant = $2 AND available = 1
            ORDER BY id ASC
            LIMIT $3
        "#,
    )
    .bind(&key.category)
    .bind(&key.variant)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(units)
}

/// Marks the units as consumed by the order. Only units that are still available are touched. Returns the number of
/// units consumed.
pub async fn consume_units(
    ids: &[i64],
    consumer: &ConsumerRecord,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE inventory_units SET available = 0, order_code = ");
    builder.push_bind(consumer.order_code.clone());
    builder.push(", buyer_session = ");
    builder.push_bind(consumer.buyer.session_id.clone());
    builder.push(", buyer_name = ");
    builder.push_bind(consumer.buyer.display_name.clone());
    builder.push(", consumed_at = ");
    builder.push_bind(Utc::now());
    builder.push(" WHERE available = 1 AND id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn add_units(key: &ProductKey, payloads: &[String], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if payloads.is_empty() {
        return Ok(0);
    }
    let now = Utc::now();
    let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO inventory_units (category, variant, payload, created_at) ");
    builder.push_values(payloads, |mut row, payload| {
        row.push_bind(key.category.clone()).push_bind(key.variant.clone()).push_bind(payload.clone()).push_bind(now);
    });
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
