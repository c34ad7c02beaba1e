use std::time::Duration;

use dgp_engine::{db_types::Product, CatalogApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the stock refresh worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Cached stock counts only gate payment requests. Fulfillment always asks the inventory directly, so a stale count
/// can never oversell.
pub fn start_stock_worker(catalog: CatalogApi<SqliteDatabase, SqliteDatabase>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Stock refresh worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running stock refresh job");
            match catalog.refresh_all().await {
                Ok(products) => info!("🕰️ Stock refreshed. {}", stock_list(&products)),
                Err(e) => error!("🕰️ Error running stock refresh job: {e}"),
            }
        }
    })
}

fn stock_list(products: &[Product]) -> String {
    products.iter().map(|p| format!("{}: {}", p.key, p.cached_stock)).collect::<Vec<String>>().join(", ")
}
