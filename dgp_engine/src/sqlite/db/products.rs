use chrono::Utc;
use dgp_common::Amount;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product, ProductKey},
    traits::LedgerError,
};

pub async fn fetch_product(key: &ProductKey, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE category = $1 AND variant = $2")
        .bind(&key.category)
        .bind(&key.variant)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    let products = sqlx::query_as("SELECT * FROM products ORDER BY category, variant").fetch_all(conn).await?;
    Ok(products)
}

/// Inserts the product, or updates the name and price if it exists. The cached stock count is left alone.
pub async fn upsert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let rows: Vec<Product> = sqlx::query_as(
        r#"
            INSERT INTO products (category, variant, name, unit_price, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (category, variant) DO UPDATE SET
                name = excluded.name,
                unit_price = excluded.unit_price,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(product.key.category)
    .bind(product.key.variant)
    .bind(product.name)
    .bind(product.unit_price)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?;
    rows.into_iter().next().ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_price(
    key: &ProductKey,
    unit_price: Amount,
    conn: &mut SqliteConnection,
) -> Result<Product, LedgerError> {
    let rows: Vec<Product> = sqlx::query_as(
        "UPDATE products SET unit_price = $1, updated_at = $2 WHERE category = $3 AND variant = $4 RETURNING *",
    )
    .bind(unit_price)
    .bind(Utc::now())
    .bind(&key.category)
    .bind(&key.variant)
    .fetch_all(conn)
    .await?;
    rows.into_iter().next().ok_or_else(|| LedgerError::ProductNotFound(key.clone()))
}

pub async fn update_cached_stock(
    key: &ProductKey,
    available: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, LedgerError> {
    let now = Utc::now();
    let rows: Vec<Product> = sqlx::query_as(
        r#"
            UPDATE products SET cached_stock = $1, stock_refreshed_at = $2, updated_at = $2
            WHERE category = $3 AND variant = $4
            RETURNING *;
        "#,
    )
    .bind(available)
    .bind(now)
    .bind(&key.category)
    .bind(&key.variant)
    .fetch_all(conn)
    .await?;
    rows.into_iter().next().ok_or_else(|| LedgerError::ProductNotFound(key.clone()))
}
