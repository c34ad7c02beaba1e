use std::{fmt::Debug, time::Duration};

use dgp_common::Amount;
use log::*;

use crate::{
    db_types::{NewProduct, Product, ProductKey},
    dgp_api::errors::CatalogError,
    helpers::with_retry,
    traits::{CatalogManagement, InventoryStore},
};

/// `CatalogApi` manages the product list, prices and the advisory stock counts.
///
/// Price changes only affect orders created afterwards. Every order captures its unit price when it is created.
#[derive(Clone)]
pub struct CatalogApi<B, I> {
    db: B,
    inventory: I,
    timeout: Duration,
}

impl<B, I> Debug for CatalogApi<B, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi")
    }
}

impl<B, I> CatalogApi<B, I> {
    pub fn new(db: B, inventory: I, timeout: Duration) -> Self {
        Self { db, inventory, timeout }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, I> CatalogApi<B, I>
where
    B: CatalogManagement,
    I: InventoryStore,
{
    pub async fn products(&self) -> Result<Vec<Product>, CatalogError> {
        let products = self.db.fetch_products().await?;
        Ok(products)
    }

    pub async fn product(&self, key: &ProductKey) -> Result<Product, CatalogError> {
        self.db.fetch_product(key).await?.ok_or_else(|| CatalogError::UnknownProduct(key.clone()))
    }

    pub async fn upsert_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        if product.name.trim().is_empty() {
            return Err(CatalogError::InvalidProduct("The product name cannot be empty".into()));
        }
        if product.key.category.trim().is_empty() || product.key.variant.trim().is_empty() {
            return Err(CatalogError::InvalidProduct("Category and variant are both required".into()));
        }
        validate_price(product.unit_price)?;
        let product = self.db.upsert_product(product).await?;
        info!("🔄️ Product {} ({}) is priced at {}", product.key, product.name, product.unit_price.to_cents_string());
        Ok(product)
    }

    pub async fn set_price(&self, key: &ProductKey, unit_price: Amount) -> Result<Product, CatalogError> {
        validate_price(unit_price)?;
        let product = self.db.update_price(key, unit_price).await?;
        info!("🔄️ Price of {key} changed to {}", unit_price.to_cents_string());
        Ok(product)
    }

    /// Asks the inventory how many units of the product are available, and caches the answer.
    pub async fn refresh_stock(&self, key: &ProductKey) -> Result<Product, CatalogError> {
        let available = with_retry("Stock count", self.timeout, || self.inventory.count_available(key))
            .await
            .map_err(|e| CatalogError::InventoryUnavailable(e.to_string()))?;
        let product = self.db.update_cached_stock(key, available).await?;
        debug!("🔄️ {available} units of {key} are available");
        Ok(product)
    }

    /// Adds units of an existing product to the inventory and refreshes its cached stock count.
    pub async fn add_stock(&self, key: &ProductKey, payloads: Vec<String>) -> Result<Product, CatalogError> {
        self.product(key).await?;
        let payloads = payloads.into_iter().map(|p| p.trim().to_string()).collect::<Vec<String>>();
        if payloads.is_empty() || payloads.iter().any(|p| p.is_empty()) {
            return Err(CatalogError::InvalidProduct("Every unit needs a non-empty payload".into()));
        }
        let added = match tokio::time::timeout(self.timeout, self.inventory.add_inventory_units(key, &payloads)).await {
            Ok(Ok(added)) => added,
            Ok(Err(e)) => return Err(CatalogError::InventoryUnavailable(e.to_string())),
            Err(_) => return Err(CatalogError::InventoryUnavailable("Timed out adding units".into())),
        };
        info!("🔄️ {added} units of {key} added to stock");
        self.refresh_stock(key).await
    }

    /// Refreshes every product. Products whose count cannot be refreshed keep their previous count.
    pub async fn refresh_all(&self) -> Result<Vec<Product>, CatalogError> {
        let mut result = Vec::new();
        for product in self.db.fetch_products().await? {
            match self.refresh_stock(&product.key).await {
                Ok(p) => result.push(p),
                Err(e) => {
                    warn!("🔄️ Could not refresh stock for {}. {e}", product.key);
                    result.push(product);
                },
            }
        }
        Ok(result)
    }
}

fn validate_price(price: Amount) -> Result<(), CatalogError> {
    if price.is_positive() && price.is_cent_aligned() {
        Ok(())
    } else {
        Err(CatalogError::InvalidPrice(price))
    }
}
