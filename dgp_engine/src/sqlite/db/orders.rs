use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderCode, OrderStatusType, OrderUpdate},
    traits::LedgerError,
};

/// Inserts a new order with status `Created`.
///
/// Returns [`LedgerError::OrderAlreadyExists`] if the order code is taken. Order codes are never reused, so the
/// caller should generate a new code and try again.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, LedgerError> {
    let now = Utc::now();
    let code = order.order_code.clone();
    let result: Result<Vec<Order>, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_code,
                category,
                variant,
                product_name,
                quantity,
                unit_price,
                total_price,
                session_id,
                display_name,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *;
        "#,
    )
    .bind(order.order_code)
    .bind(order.product.category)
    .bind(order.product.variant)
    .bind(order.product_name)
    .bind(order.quantity)
    .bind(order.unit_price)
    .bind(order.total_price)
    .bind(order.buyer.session_id)
    .bind(order.buyer.display_name)
    .bind(OrderStatusType::Created)
    .bind(now)
    .fetch_all(conn)
    .await;
    match result {
        Ok(rows) => rows
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::DatabaseError(format!("Order {code} was stored, but not returned"))),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Order code {code} is already taken");
            Err(LedgerError::OrderAlreadyExists(code))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order(code: &OrderCode, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_code = $1").bind(code).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_orders_with_status(
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE status = $1 ORDER BY created_at ASC")
        .bind(status)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Moves the order to `to` in a single compare-and-set statement, applying any field changes in `update`.
///
/// The `WHERE` clause only accepts legal predecessors of `to`, so a stale caller cannot overwrite a transition that
/// has already happened.
pub async fn transition_order(
    code: &OrderCode,
    to: OrderStatusType,
    update: OrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<Order, LedgerError> {
    let from = OrderStatusType::predecessors_of(to);
    if from.is_empty() {
        let current = fetch_order(code, conn).await?.ok_or_else(|| LedgerError::OrderNotFound(code.clone()))?;
        return Err(LedgerError::IllegalTransition { order_code: code.clone(), from: current.status, to });
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(reference) = update.confirmation_ref {
        builder.push(", confirmation_ref = ");
        builder.push_bind(reference);
    }
    if let Some(fingerprint) = update.fingerprint {
        builder.push(", fingerprint = ");
        builder.push_bind(fingerprint);
    }
    builder.push(" WHERE order_code = ");
    builder.push_bind(code.clone());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(status);
    }
    statuses.push_unseparated(") RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let updated: Vec<Order> = builder.build_query_as().fetch_all(&mut *conn).await?;
    match updated.into_iter().next() {
        Some(order) => {
            debug!("🗃️ Order {code} is now {to}");
            Ok(order)
        },
        None => {
            let current = fetch_order(code, conn).await?.ok_or_else(|| LedgerError::OrderNotFound(code.clone()))?;
            debug!("🗃️ Order {code} cannot move from {} to {to}", current.status);
            Err(LedgerError::IllegalTransition { order_code: code.clone(), from: current.status, to })
        },
    }
}
