use std::str::FromStr;

use chrono::Utc;
use cucumber::given;
use dgp_common::Amount;
use dgp_engine::{
    db_types::{NewProduct, ProductKey},
    helpers::MAX_OFFSET_MICROS,
};

use crate::cucumber::{shop_world::ShopSystem, ShopWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut ShopWorld) {
    let system = ShopSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a product {string} named {string} priced at {word}")]
async fn add_product(world: &mut ShopWorld, key: String, name: String, price: String) {
    let key = ProductKey::from_str(&key).expect("Not a valid product key");
    let price = Amount::from_str(&price).expect("Not a valid price");
    world.api().catalog().upsert_product(NewProduct::new(key, name, price)).await.expect("Error adding product");
}

#[given(expr = "{int} units of {string} are in stock")]
async fn stock_units(world: &mut ShopWorld, count: i64, key: String) {
    let key = ProductKey::from_str(&key).expect("Not a valid product key");
    let payloads = (1..=count).map(|i| ShopWorld::unit_payload(&key, i)).collect::<Vec<_>>();
    world.api().catalog().add_stock(&key, payloads).await.expect("Error adding inventory");
}

#[given(expr = "every payment amount at {word} has already been sighted")]
async fn exhaust_offsets(world: &mut ShopWorld, base: String) {
    let base = Amount::from_str(&base).expect("Not a valid amount");
    for offset in 1..=MAX_OFFSET_MICROS {
        let amount = base + Amount::from_micros(offset);
        world.api().record_sighting(amount, Utc::now()).await.expect("Error recording sighting");
    }
}

#[given(expr = "the inventory fails the next {int} requests")]
async fn inventory_fails(world: &mut ShopWorld, n: u32) {
    world.system().inventory.fail_next(n);
}

#[given(expr = "the inventory hangs on the next {int} requests")]
async fn inventory_hangs(world: &mut ShopWorld, n: u32) {
    world.system().inventory.hang_next(n);
}

#[given("buyer sessions are closed")]
async fn sessions_closed(world: &mut ShopWorld) {
    world.system().notifier.close_buyer_channel();
}
